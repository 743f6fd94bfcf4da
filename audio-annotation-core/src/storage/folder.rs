use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::blob::{mime_for_extension, AudioBlob};
use crate::models::error::StorageError;
use crate::models::record::MetadataDocument;
use crate::storage::metadata::{read_metadata, write_atomic, write_metadata};
use crate::storage::audio_file_stem;
use crate::traits::storage_backend::StorageBackend;

const SYSTEM_DIR: &str = "system";
const AUDIOS_DIR: &str = "audios";
const TEMP_DIR: &str = "temp";
const DATA_DIR: &str = "data";
const METADATA_FILE: &str = "metadata.json";

/// Storage backed by a user-granted directory.
///
/// ## Layout
/// ```text
/// <root>/<folder_name>/system/
/// ├── audios/<file-stem>.<ext>
/// ├── temp/            ← staging area for atomic replaces
/// └── data/metadata.json
/// ```
#[derive(Debug, Clone)]
pub struct FolderStore {
    system_dir: PathBuf,
}

impl FolderStore {
    /// Create the directory layout under `root` and seed an empty metadata
    /// document if none exists.
    pub fn provision(root: &Path, folder_name: &str) -> Result<Self, StorageError> {
        let store = Self {
            system_dir: root.join(folder_name).join(SYSTEM_DIR),
        };
        for dir in [store.audios_dir(), store.temp_dir(), store.data_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| StorageError::Io(format!("failed to create {}: {}", dir.display(), e)))?;
        }
        if !store.metadata_path().exists() {
            write_metadata(&MetadataDocument::empty(), &store.metadata_path(), &store.temp_dir())?;
        }
        Ok(store)
    }

    /// Reopen a previously provisioned `system` directory.
    ///
    /// Returns `None` if the directory is gone or no longer writable.
    pub fn reopen(system_dir: PathBuf) -> Option<Self> {
        let store = Self { system_dir };
        if !store.has_access() {
            return None;
        }
        // Subdirectories may have been removed by hand; recreate them quietly.
        for dir in [store.audios_dir(), store.temp_dir(), store.data_dir()] {
            if let Err(e) = fs::create_dir_all(&dir) {
                log::warn!("Cannot restore {}: {}", dir.display(), e);
                return None;
            }
        }
        Some(store)
    }

    pub fn system_dir(&self) -> &Path {
        &self.system_dir
    }

    pub fn audio_path(&self, ext_id: &str, ext: &str) -> PathBuf {
        self.audios_dir().join(format!("{}.{}", audio_file_stem(ext_id), ext))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir().join(METADATA_FILE)
    }

    fn audios_dir(&self) -> PathBuf {
        self.system_dir.join(AUDIOS_DIR)
    }

    fn temp_dir(&self) -> PathBuf {
        self.system_dir.join(TEMP_DIR)
    }

    fn data_dir(&self) -> PathBuf {
        self.system_dir.join(DATA_DIR)
    }
}

impl StorageBackend for FolderStore {
    fn has_access(&self) -> bool {
        match fs::metadata(&self.system_dir) {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }

    fn write_audio(&mut self, ext_id: &str, blob: &AudioBlob, ext: &str) -> Result<(), StorageError> {
        if !self.has_access() {
            return Err(StorageError::NoFolderAccess);
        }
        write_atomic(&self.temp_dir(), &self.audio_path(ext_id, ext), &blob.bytes)
    }

    fn read_audio(&self, ext_id: &str, ext: &str) -> Result<Option<AudioBlob>, StorageError> {
        let path = self.audio_path(ext_id, ext);
        match fs::read(&path) {
            Ok(bytes) => {
                let mime = mime_for_extension(ext).unwrap_or("application/octet-stream");
                Ok(Some(AudioBlob::new(bytes, mime)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!("failed to read {}: {}", path.display(), e))),
        }
    }

    fn delete_audio(&mut self, ext_id: &str, ext: &str) -> Result<(), StorageError> {
        let path = self.audio_path(ext_id, ext);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("failed to delete {}: {}", path.display(), e))),
        }
    }

    fn read_meta(&self) -> Result<MetadataDocument, StorageError> {
        read_metadata(&self.metadata_path())
    }

    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError> {
        if !self.has_access() {
            return Err(StorageError::NoFolderAccess);
        }
        write_metadata(doc, &self.metadata_path(), &self.temp_dir())
    }
}
