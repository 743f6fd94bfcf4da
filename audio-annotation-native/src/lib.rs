//! # audio-annotation-native
//!
//! Device backends for audio-annotation-core.
//!
//! Provides (behind the `device` feature):
//! - `CpalCapture`: Microphone capture via cpal, encoded to WAV on stop
//! - `RodioPlayback`: Single-clip playback on the default output device
//! - `RfdFolderPicker`: Native folder dialog for folder-backed storage
//! - `permissions`: Microphone availability check
//!
//! ## Platform Requirements
//! - Linux: ALSA development headers (`libasound2-dev`) and GTK3 for the folder dialog
//! - macOS / Windows: no extra system packages
//!
//! ## Usage
//! ```ignore
//! use audio_annotation_core::AnnotationConfig;
//! use audio_annotation_native::attach_audio_layer;
//!
//! let nodes = ["intro", "week 1"];
//! let mut layer = attach_audio_layer(AnnotationConfig::default(), nodes, |id| id.to_string(), None)?;
//! layer.handle_tap("intro")?; // start recording
//! ```

#[cfg(feature = "device")]
pub mod cpal_capture;
#[cfg(feature = "device")]
pub mod folder_picker;
#[cfg(feature = "device")]
pub mod permissions;
#[cfg(feature = "device")]
pub mod rodio_playback;

#[cfg(feature = "device")]
pub use cpal_capture::CpalCapture;
#[cfg(feature = "device")]
pub use folder_picker::RfdFolderPicker;
#[cfg(feature = "device")]
pub use rodio_playback::RodioPlayback;

#[cfg(feature = "device")]
use std::sync::Arc;

#[cfg(feature = "device")]
use audio_annotation_core::{
    AnnotationConfig, AnnotationController, AnnotationDelegate, AnnotationError, AudioLayer, FolderPicker,
};

/// Audio layer wired to the default microphone and output device.
#[cfg(feature = "device")]
pub type NativeAudioLayer = AudioLayer<CpalCapture, RodioPlayback>;

/// Open the device-backed layer, bind every element and return it.
///
/// The folder picker is only offered when `allow_local_file_system` is set.
#[cfg(feature = "device")]
pub fn attach_audio_layer<T, I, F>(
    config: AnnotationConfig,
    elements: I,
    ext_id_of: F,
    delegate: Option<Arc<dyn AnnotationDelegate>>,
) -> Result<NativeAudioLayer, AnnotationError>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> String,
{
    if !permissions::check_microphone_permission() {
        log::warn!("No usable microphone, recording will fail until one is available");
    }
    let picker: Option<Box<dyn FolderPicker>> = if config.allow_local_file_system {
        Some(Box::new(RfdFolderPicker::default()))
    } else {
        None
    };
    let playback = RodioPlayback::new()?;
    let mut layer = AnnotationController::open(config, CpalCapture::new(), playback, picker)?;
    if let Some(delegate) = delegate {
        layer.set_delegate(delegate);
    }
    let bound = layer.attach(elements, ext_id_of);
    log::info!("Audio layer attached to {} nodes", bound.len());
    Ok(layer)
}
