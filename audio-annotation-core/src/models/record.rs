use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk metadata schema.
pub const SCHEMA_VERSION: u32 = 1;

/// Audio annotation attached to one graph node.
///
/// Field names match the persisted `metadata.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAudioRecord {
    #[serde(rename = "extId")]
    pub ext_id: String,
    pub local_path: String,
    pub duration_seconds: f64,
    pub mime: String,
    pub created_at: String,
    pub last_modified: String,
}

impl NodeAudioRecord {
    /// Creates a record for a blob stored as `audios/<file_stem>.<ext>`.
    pub fn new(ext_id: &str, file_stem: &str, ext: &str, duration_seconds: f64, mime: &str) -> Self {
        let now = timestamp_now();
        Self {
            ext_id: ext_id.to_string(),
            local_path: format!("audios/{}.{}", file_stem, ext),
            duration_seconds: duration_seconds.max(0.0),
            mime: mime.to_string(),
            created_at: now.clone(),
            last_modified: now,
        }
    }

    /// Replaces this record with `next`, keeping the original creation time.
    pub fn superseded_by(&self, mut next: NodeAudioRecord) -> NodeAudioRecord {
        next.created_at = self.created_at.clone();
        next
    }

    /// File extension of the stored blob, if the path carries one.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.local_path.rsplit('/').next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

/// The whole metadata document, rewritten wholesale on every mutation.
///
/// A `None` entry is a tombstone: the node had audio once (or was cleared
/// explicitly) and currently has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub nodes: BTreeMap<String, Option<NodeAudioRecord>>,
}

impl MetadataDocument {
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            nodes: BTreeMap::new(),
        }
    }

    /// Live (non-tombstoned) record for `ext_id`.
    pub fn record(&self, ext_id: &str) -> Option<&NodeAudioRecord> {
        self.nodes.get(ext_id).and_then(Option::as_ref)
    }

    pub fn has_record(&self, ext_id: &str) -> bool {
        self.record(ext_id).is_some()
    }

    pub fn is_tombstoned(&self, ext_id: &str) -> bool {
        matches!(self.nodes.get(ext_id), Some(None))
    }

    pub fn upsert(&mut self, record: NodeAudioRecord) {
        self.nodes.insert(record.ext_id.clone(), Some(record));
    }

    pub fn tombstone(&mut self, ext_id: &str) {
        self.nodes.insert(ext_id.to_string(), None);
    }
}

impl Default for MetadataDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
