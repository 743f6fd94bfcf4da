use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::models::error::StorageError;
use crate::models::record::{MetadataDocument, SCHEMA_VERSION};

/// Serialize the metadata document as pretty-printed JSON.
pub fn encode_metadata(doc: &MetadataDocument) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(doc)
        .map_err(|e| StorageError::Corrupt(format!("failed to serialize metadata: {}", e)))
}

/// Parse a metadata document.
pub fn decode_metadata(bytes: &[u8]) -> Result<MetadataDocument, StorageError> {
    let doc: MetadataDocument = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::Corrupt(format!("failed to parse metadata: {}", e)))?;
    if doc.schema_version > SCHEMA_VERSION {
        log::warn!(
            "Metadata schema version {} is newer than supported version {}",
            doc.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(doc)
}

/// Read `metadata.json`, returning an empty document when the file does not exist.
pub fn read_metadata(path: &Path) -> Result<MetadataDocument, StorageError> {
    match fs::read(path) {
        Ok(bytes) => decode_metadata(&bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(MetadataDocument::empty()),
        Err(e) => Err(StorageError::Io(format!("failed to read metadata: {}", e))),
    }
}

/// Write `metadata.json` through a temp file in `temp_dir`.
pub fn write_metadata(doc: &MetadataDocument, path: &Path, temp_dir: &Path) -> Result<(), StorageError> {
    let json = encode_metadata(doc)?;
    write_atomic(temp_dir, path, &json)
}

/// Write `data` to `target` so readers see either the old or the new content.
///
/// The bytes go to a uniquely named file in `temp_dir` (same filesystem as
/// `target`), are synced, then renamed over `target`.
pub fn write_atomic(temp_dir: &Path, target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::Io(format!("invalid target path: {}", target.display())))?;
    let temp_path = temp_dir.join(format!("{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = (|| -> Result<(), StorageError> {
        let mut file = File::create(&temp_path)
            .map_err(|e| StorageError::Io(format!("failed to create temp file: {}", e)))?;
        file.write_all(data)
            .map_err(|e| StorageError::Io(format!("write failed: {}", e)))?;
        file.sync_all()
            .map_err(|e| StorageError::Io(format!("sync failed: {}", e)))?;
        drop(file);
        fs::rename(&temp_path, target)
            .map_err(|e| StorageError::Io(format!("failed to replace {}: {}", file_name, e)))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
