use std::path::PathBuf;

use crate::models::blob::AudioBlob;
use crate::models::error::StorageError;
use crate::models::record::MetadataDocument;

/// Uniform persistence contract for audio blobs and the metadata document.
///
/// Implemented by:
/// - `FolderStore` (user-granted directory tree)
/// - `DatabaseStore` (embedded sled database)
/// - `AudioStore` (switches between the two)
pub trait StorageBackend {
    /// Reacquire a previously granted folder. Never fails.
    fn initialize(&mut self) {}

    /// Ask the user for a folder. Denial or cancel yields `false`.
    fn request_folder_permission(&mut self) -> bool {
        false
    }

    /// Whether a live, permission-verified folder is held.
    fn has_access(&self) -> bool {
        false
    }

    /// Store `blob` for `ext_id`, replacing any prior blob atomically.
    fn write_audio(&mut self, ext_id: &str, blob: &AudioBlob, ext: &str) -> Result<(), StorageError>;

    /// `Ok(None)` when no blob is stored for `ext_id`.
    fn read_audio(&self, ext_id: &str, ext: &str) -> Result<Option<AudioBlob>, StorageError>;

    /// Remove the blob for `ext_id`. Absence is not an error.
    fn delete_audio(&mut self, ext_id: &str, ext: &str) -> Result<(), StorageError>;

    /// The stored document, or an empty one if none exists yet.
    fn read_meta(&self) -> Result<MetadataDocument, StorageError>;

    /// Replace the stored document atomically.
    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError>;
}

/// Prompts the user to choose a directory.
pub trait FolderPicker {
    /// `None` when the user cancels or denies access.
    fn pick_folder(&mut self) -> Option<PathBuf>;
}
