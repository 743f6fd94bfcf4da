use std::path::PathBuf;

use audio_annotation_core::traits::storage_backend::FolderPicker;

/// Native directory chooser.
pub struct RfdFolderPicker {
    title: String,
}

impl RfdFolderPicker {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

impl Default for RfdFolderPicker {
    fn default() -> Self {
        Self::new("Choose a folder for voice notes")
    }
}

impl FolderPicker for RfdFolderPicker {
    fn pick_folder(&mut self) -> Option<PathBuf> {
        let picked = rfd::FileDialog::new().set_title(&self.title).pick_folder();
        if picked.is_none() {
            log::debug!("Folder dialog dismissed");
        }
        picked
    }
}
