//! # audio-annotation-core
//!
//! Platform-agnostic voice-note layer for graph nodes.
//!
//! Each node id carries at most one short audio clip. A tap records, plays
//! or pauses; a long-press deletes. Clips and a metadata document are kept
//! in a user-granted folder when one is held, and in an embedded database
//! otherwise. Device backends (microphone capture, audio output, folder
//! picker) implement the traits in `traits/` and plug into the generic
//! `AnnotationController`.
//!
//! ## Architecture
//!
//! ```text
//! audio-annotation-core (this crate)
//! ├── traits/       ← StorageBackend, CaptureEngine, PlaybackEngine, AnnotationDelegate
//! ├── models/       ← NodeState, NodeAudioRecord, MetadataDocument, AudioBlob, errors, config
//! ├── gesture/      ← GestureRecognizer (tap vs long-press)
//! ├── processing/   ← WAV encoding and duration probing
//! ├── session/      ← AnnotationController (per-node state machine)
//! └── storage/      ← FolderStore, DatabaseStore, AudioStore, metadata JSON
//! ```

pub mod gesture;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use gesture::recognizer::{Gesture, GestureRecognizer, DEFAULT_LONG_PRESS};
pub use models::blob::{AudioBlob, ExportedClip};
pub use models::config::{load_config, save_config, AnnotationConfig};
pub use models::error::{AnnotationError, CaptureError, ErrorCode, PlaybackError, StorageError};
pub use models::record::{MetadataDocument, NodeAudioRecord, SCHEMA_VERSION};
pub use models::state::NodeState;
pub use session::controller::{AnnotationController, AudioLayer};
pub use storage::database::DatabaseStore;
pub use storage::folder::FolderStore;
pub use storage::{audio_file_stem, sanitize_ext_id};
pub use storage::store::AudioStore;
pub use traits::annotation_delegate::{AnnotationDelegate, ErrorContext};
pub use traits::capture_engine::CaptureEngine;
pub use traits::playback_engine::{EndedCallback, PlaybackEngine};
pub use traits::storage_backend::{FolderPicker, StorageBackend};
