use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::sanitize_ext_id;

/// Configuration for an annotation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Allow a user-granted local folder as the storage target (default: false).
    pub allow_local_file_system: bool,

    /// Persist the metadata document after every mutation (default: true).
    pub auto_save_metadata: bool,

    /// Hold time before a press counts as a long-press (default: 700 ms).
    pub long_press_ms: u64,

    /// Folder created under the granted root (default: "gestor").
    pub folder_name: String,

    /// Extension used when neither a file name nor a MIME type gives one (default: "webm").
    pub default_extension: String,

    /// Location of the embedded database.
    pub database_path: PathBuf,
}

impl AnnotationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.long_press_ms == 0 {
            return Err("long press duration must be positive".into());
        }
        if self.folder_name.trim_matches('.').is_empty() || sanitize_ext_id(&self.folder_name) != self.folder_name {
            return Err(format!("invalid folder name: {:?}", self.folder_name));
        }
        if self.default_extension.is_empty()
            || !self.default_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(format!("invalid default extension: {:?}", self.default_extension));
        }
        Ok(())
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            allow_local_file_system: false,
            auto_save_metadata: true,
            long_press_ms: 700,
            folder_name: "gestor".into(),
            default_extension: "webm".into(),
            database_path: PathBuf::from("audio-layer.db"),
        }
    }
}

/// Load a config file, falling back to defaults when it is missing or unreadable.
pub fn load_config(path: &Path) -> AnnotationConfig {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to read config {}: {}", path.display(), e);
            }
            return AnnotationConfig::default();
        }
    };
    match serde_json::from_str(&json) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), e);
            AnnotationConfig::default()
        }
    }
}

pub fn save_config(path: &Path, config: &AnnotationConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("failed to write config: {}", e))
}
