use crate::models::blob::AudioBlob;
use crate::models::config::AnnotationConfig;
use crate::models::error::StorageError;
use crate::models::record::MetadataDocument;
use crate::storage::database::DatabaseStore;
use crate::storage::folder::FolderStore;
use crate::traits::storage_backend::{FolderPicker, StorageBackend};

/// Which backend currently receives reads and writes.
enum Backend {
    Folder(FolderStore),
    Database,
}

/// Storage facade that targets a user-granted folder when one is held and the
/// embedded database otherwise.
///
/// The database is always open: it is the fallback target and it remembers
/// the granted folder between sessions.
pub struct AudioStore {
    database: DatabaseStore,
    backend: Backend,
    picker: Option<Box<dyn FolderPicker>>,
    allow_local_file_system: bool,
    folder_name: String,
}

impl AudioStore {
    /// Open the database at `config.database_path`.
    pub fn open(config: &AnnotationConfig, picker: Option<Box<dyn FolderPicker>>) -> Result<Self, StorageError> {
        let database = DatabaseStore::open(&config.database_path)?;
        Ok(Self::with_database(database, config, picker))
    }

    pub fn with_database(
        database: DatabaseStore,
        config: &AnnotationConfig,
        picker: Option<Box<dyn FolderPicker>>,
    ) -> Self {
        Self {
            database,
            backend: Backend::Database,
            picker,
            allow_local_file_system: config.allow_local_file_system,
            folder_name: config.folder_name.clone(),
        }
    }

    /// Whether blobs currently go to a folder rather than the database.
    pub fn is_folder_backed(&self) -> bool {
        matches!(self.backend, Backend::Folder(_))
    }

    pub fn folder(&self) -> Option<&FolderStore> {
        match &self.backend {
            Backend::Folder(folder) => Some(folder),
            Backend::Database => None,
        }
    }

    pub fn database(&self) -> &DatabaseStore {
        &self.database
    }

    fn active(&self) -> &dyn StorageBackend {
        match &self.backend {
            Backend::Folder(folder) if folder.has_access() => folder as &dyn StorageBackend,
            _ => &self.database,
        }
    }

    fn active_mut(&mut self) -> &mut dyn StorageBackend {
        self.degrade_if_revoked();
        match &mut self.backend {
            Backend::Folder(folder) => folder as &mut dyn StorageBackend,
            Backend::Database => &mut self.database,
        }
    }

    /// Drop a folder whose access has gone away and fall back to the database.
    fn degrade_if_revoked(&mut self) {
        if let Backend::Folder(folder) = &self.backend {
            if !folder.has_access() {
                log::warn!(
                    "Lost access to {}, falling back to embedded database",
                    folder.system_dir().display()
                );
                self.backend = Backend::Database;
            }
        }
    }
}

impl StorageBackend for AudioStore {
    fn initialize(&mut self) {
        if !self.allow_local_file_system {
            self.backend = Backend::Database;
            return;
        }
        let remembered = match self.database.remembered_folder() {
            Ok(remembered) => remembered,
            Err(e) => {
                log::warn!("Failed to look up remembered folder: {}", e);
                None
            }
        };
        let Some(system_dir) = remembered else {
            log::debug!("No remembered folder, using embedded database");
            return;
        };
        match FolderStore::reopen(system_dir.clone()) {
            Some(folder) => {
                log::info!("Reacquired folder {}", system_dir.display());
                self.backend = Backend::Folder(folder);
            }
            None => {
                log::warn!(
                    "Remembered folder {} is no longer accessible, using embedded database",
                    system_dir.display()
                );
                if let Err(e) = self.database.forget_folder() {
                    log::warn!("Failed to forget folder: {}", e);
                }
                self.backend = Backend::Database;
            }
        }
    }

    fn request_folder_permission(&mut self) -> bool {
        if !self.allow_local_file_system {
            return false;
        }
        let Some(picker) = self.picker.as_mut() else {
            log::warn!("No folder picker available");
            return false;
        };
        let Some(root) = picker.pick_folder() else {
            log::info!("Folder selection cancelled");
            return false;
        };
        let folder = match FolderStore::provision(&root, &self.folder_name) {
            Ok(folder) => folder,
            Err(e) => {
                log::warn!("Cannot use {}: {}", root.display(), e);
                return false;
            }
        };
        // Never adopt a folder whose metadata cannot be read.
        if let Err(e) = folder.read_meta() {
            log::warn!("Refusing {}: {}", folder.system_dir().display(), e);
            return false;
        }
        if let Err(e) = self.database.remember_folder(folder.system_dir()) {
            log::warn!("Failed to remember folder for next session: {}", e);
        }
        log::info!("Using folder {}", folder.system_dir().display());
        self.backend = Backend::Folder(folder);
        true
    }

    fn has_access(&self) -> bool {
        match &self.backend {
            Backend::Folder(folder) => folder.has_access(),
            Backend::Database => false,
        }
    }

    fn write_audio(&mut self, ext_id: &str, blob: &AudioBlob, ext: &str) -> Result<(), StorageError> {
        self.active_mut().write_audio(ext_id, blob, ext)
    }

    fn read_audio(&self, ext_id: &str, ext: &str) -> Result<Option<AudioBlob>, StorageError> {
        self.active().read_audio(ext_id, ext)
    }

    fn delete_audio(&mut self, ext_id: &str, ext: &str) -> Result<(), StorageError> {
        self.active_mut().delete_audio(ext_id, ext)
    }

    fn read_meta(&self) -> Result<MetadataDocument, StorageError> {
        self.active().read_meta()
    }

    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError> {
        self.active_mut().write_meta(doc)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    struct FixedPicker(Option<PathBuf>);

    impl FolderPicker for FixedPicker {
        fn pick_folder(&mut self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    fn local_config() -> AnnotationConfig {
        AnnotationConfig {
            allow_local_file_system: true,
            ..Default::default()
        }
    }

    fn store(config: &AnnotationConfig, pick: Option<PathBuf>) -> AudioStore {
        let database = DatabaseStore::temporary().unwrap();
        AudioStore::with_database(database, config, Some(Box::new(FixedPicker(pick))))
    }

    #[test]
    fn flag_off_short_circuits_permission_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&AnnotationConfig::default(), Some(dir.path().to_path_buf()));

        assert!(!store.request_folder_permission());
        assert!(!store.has_access());
        assert!(!dir.path().join("gestor").exists());
    }

    #[test]
    fn cancelled_picker_keeps_database() {
        let mut store = store(&local_config(), None);
        store.write_audio("n1", &AudioBlob::new(vec![1], "audio/webm"), "webm").unwrap();

        assert!(!store.request_folder_permission());
        assert!(!store.is_folder_backed());
        assert!(store.read_audio("n1", "webm").unwrap().is_some());
    }

    #[test]
    fn granted_folder_receives_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&local_config(), Some(dir.path().to_path_buf()));

        assert!(store.request_folder_permission());
        assert!(store.has_access());

        store.write_audio("n1", &AudioBlob::new(vec![4, 2], "audio/webm"), "webm").unwrap();
        let on_disk = dir.path().join("gestor/system/audios/n1.webm");
        assert_eq!(fs::read(on_disk).unwrap(), vec![4, 2]);
        assert_eq!(store.database().read_audio("n1", "webm").unwrap(), None);
    }

    #[test]
    fn folder_with_corrupt_metadata_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = dir.path().join("gestor/system/data/metadata.json");
        fs::create_dir_all(metadata.parent().unwrap()).unwrap();
        fs::write(&metadata, "{ not json").unwrap();
        let mut store = store(&local_config(), Some(dir.path().to_path_buf()));

        assert!(!store.request_folder_permission());
        assert!(!store.is_folder_backed());
        assert_eq!(store.database().remembered_folder().unwrap(), None);
        assert_eq!(fs::read_to_string(metadata).unwrap(), "{ not json");
    }

    #[test]
    fn initialize_reacquires_remembered_folder() {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseStore::temporary().unwrap();
        let folder = FolderStore::provision(dir.path(), "gestor").unwrap();
        database.remember_folder(folder.system_dir()).unwrap();

        let mut store = AudioStore::with_database(database, &local_config(), None);
        store.initialize();
        assert!(store.is_folder_backed());
        assert!(store.has_access());
    }

    #[test]
    fn initialize_falls_back_when_folder_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseStore::temporary().unwrap();
        database
            .remember_folder(&dir.path().join("gone/gestor/system"))
            .unwrap();

        let mut store = AudioStore::with_database(database, &local_config(), None);
        store.initialize();
        assert!(!store.is_folder_backed());
        assert_eq!(store.read_meta().unwrap(), MetadataDocument::empty());
        assert_eq!(store.database().remembered_folder().unwrap(), None);
    }

    #[test]
    fn initialize_ignores_folder_when_flag_off() {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseStore::temporary().unwrap();
        let folder = FolderStore::provision(dir.path(), "gestor").unwrap();
        database.remember_folder(folder.system_dir()).unwrap();

        let mut store = AudioStore::with_database(database, &AnnotationConfig::default(), None);
        store.initialize();
        assert!(!store.is_folder_backed());
    }

    #[test]
    fn revoked_folder_degrades_to_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&local_config(), Some(dir.path().to_path_buf()));
        assert!(store.request_folder_permission());

        fs::remove_dir_all(dir.path().join("gestor")).unwrap();
        assert!(!store.has_access());

        let blob = AudioBlob::new(vec![8], "audio/webm");
        store.write_audio("n1", &blob, "webm").unwrap();
        assert!(!store.is_folder_backed());
        assert_eq!(store.read_audio("n1", "webm").unwrap(), Some(blob));
    }
}
