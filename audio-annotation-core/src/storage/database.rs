use std::path::{Path, PathBuf};

use crate::models::blob::AudioBlob;
use crate::models::error::StorageError;
use crate::models::record::MetadataDocument;
use crate::storage::metadata::{decode_metadata, encode_metadata};
use crate::traits::storage_backend::StorageBackend;

const AUDIOS_TREE: &str = "audios";
const METADATA_TREE: &str = "metadata";
const HANDLES_TREE: &str = "handles";
const METADATA_KEY: &str = "singleton";
const ROOT_HANDLE_KEY: &str = "root";

/// Storage backed by an embedded sled database.
///
/// Blobs are keyed by the raw node id. Each value packs the MIME type and the
/// audio bytes so a blob is replaced by a single atomic insert:
/// ```text
/// [4-byte LE mime length] [mime bytes] [audio bytes]
/// ```
/// The `handles` tree remembers the granted folder across sessions.
#[derive(Clone)]
pub struct DatabaseStore {
    db: sled::Db,
    audios: sled::Tree,
    metadata: sled::Tree,
    handles: sled::Tree,
}

impl DatabaseStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| StorageError::Database(format!("failed to open {}: {}", path.display(), e)))?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            audios: db.open_tree(AUDIOS_TREE)?,
            metadata: db.open_tree(METADATA_TREE)?,
            handles: db.open_tree(HANDLES_TREE)?,
            db,
        })
    }

    /// Persist the granted folder so the next session can reacquire it.
    pub fn remember_folder(&self, system_dir: &Path) -> Result<(), StorageError> {
        self.handles
            .insert(ROOT_HANDLE_KEY, system_dir.to_string_lossy().as_bytes())?;
        self.flush()
    }

    pub fn remembered_folder(&self) -> Result<Option<PathBuf>, StorageError> {
        let value = self.handles.get(ROOT_HANDLE_KEY)?;
        Ok(value.map(|v| PathBuf::from(String::from_utf8_lossy(&v).into_owned())))
    }

    pub fn forget_folder(&self) -> Result<(), StorageError> {
        self.handles.remove(ROOT_HANDLE_KEY)?;
        self.flush()
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl StorageBackend for DatabaseStore {
    fn write_audio(&mut self, ext_id: &str, blob: &AudioBlob, _ext: &str) -> Result<(), StorageError> {
        self.audios.insert(ext_id, pack_blob(blob))?;
        self.flush()
    }

    fn read_audio(&self, ext_id: &str, _ext: &str) -> Result<Option<AudioBlob>, StorageError> {
        match self.audios.get(ext_id)? {
            Some(value) => unpack_blob(&value).map(Some),
            None => Ok(None),
        }
    }

    fn delete_audio(&mut self, ext_id: &str, _ext: &str) -> Result<(), StorageError> {
        self.audios.remove(ext_id)?;
        self.flush()
    }

    fn read_meta(&self) -> Result<MetadataDocument, StorageError> {
        match self.metadata.get(METADATA_KEY)? {
            Some(value) => decode_metadata(&value),
            None => Ok(MetadataDocument::empty()),
        }
    }

    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError> {
        self.metadata.insert(METADATA_KEY, encode_metadata(doc)?)?;
        self.flush()
    }
}

fn pack_blob(blob: &AudioBlob) -> Vec<u8> {
    let mime = blob.mime.as_bytes();
    let mut packed = Vec::with_capacity(4 + mime.len() + blob.bytes.len());
    packed.extend_from_slice(&(mime.len() as u32).to_le_bytes());
    packed.extend_from_slice(mime);
    packed.extend_from_slice(&blob.bytes);
    packed
}

fn unpack_blob(value: &[u8]) -> Result<AudioBlob, StorageError> {
    let truncated = || StorageError::Corrupt("truncated audio entry".into());
    let len_bytes: [u8; 4] = value.get(..4).ok_or_else(truncated)?.try_into().map_err(|_| truncated())?;
    let mime_len = u32::from_le_bytes(len_bytes) as usize;
    let mime = value.get(4..4 + mime_len).ok_or_else(truncated)?;
    let mime = String::from_utf8(mime.to_vec())
        .map_err(|e| StorageError::Corrupt(format!("invalid mime type: {}", e)))?;
    Ok(AudioBlob::new(value[4 + mime_len..].to_vec(), mime))
}
