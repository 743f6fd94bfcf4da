//! In-crate fakes for controller tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::blob::AudioBlob;
use crate::models::error::{CaptureError, ErrorCode, PlaybackError, StorageError};
use crate::models::record::MetadataDocument;
use crate::models::state::NodeState;
use crate::storage::database::DatabaseStore;
use crate::traits::annotation_delegate::{AnnotationDelegate, ErrorContext};
use crate::traits::capture_engine::CaptureEngine;
use crate::traits::playback_engine::{EndedCallback, PlaybackEngine};
use crate::traits::storage_backend::StorageBackend;

/// Bytes every fake recording produces (an EBML magic plus filler).
pub const FAKE_CLIP: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3, 0x42, 0x86, 0x81, 0x01];

/// Delegate that records every notification.
#[derive(Default)]
pub struct RecordingDelegate {
    pub transitions: Mutex<Vec<(String, NodeState)>>,
    pub errors: Mutex<Vec<(ErrorCode, ErrorContext)>>,
}

impl RecordingDelegate {
    pub fn error_codes(&self) -> Vec<ErrorCode> {
        self.errors.lock().iter().map(|(code, _)| *code).collect()
    }

    pub fn transitions_of(&self, ext_id: &str) -> Vec<NodeState> {
        self.transitions
            .lock()
            .iter()
            .filter(|(id, _)| id == ext_id)
            .map(|(_, state)| *state)
            .collect()
    }
}

impl AnnotationDelegate for RecordingDelegate {
    fn on_state_changed(&self, ext_id: &str, state: NodeState) {
        self.transitions.lock().push((ext_id.to_string(), state));
    }

    fn on_error(&self, code: ErrorCode, context: &ErrorContext) {
        self.errors.lock().push((code, context.clone()));
    }
}

#[derive(Default)]
pub struct CaptureLog {
    pub deny: bool,
    pub recording: bool,
    pub starts: usize,
    pub releases: usize,
}

/// Capture engine whose clones share one log, so a test can keep a handle
/// after moving the engine into a controller.
#[derive(Clone, Default)]
pub struct FakeCapture {
    pub log: Arc<Mutex<CaptureLog>>,
}

impl FakeCapture {
    pub fn deny(&self) {
        self.log.lock().deny = true;
    }

    pub fn releases(&self) -> usize {
        self.log.lock().releases
    }
}

impl CaptureEngine for FakeCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        let mut log = self.log.lock();
        if log.deny {
            return Err(CaptureError::PermissionDenied);
        }
        if log.recording {
            return Err(CaptureError::Busy);
        }
        log.recording = true;
        log.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<AudioBlob, CaptureError> {
        let mut log = self.log.lock();
        if !log.recording {
            return Err(CaptureError::NotRecording);
        }
        log.recording = false;
        log.releases += 1;
        Ok(AudioBlob::new(FAKE_CLIP.to_vec(), "audio/webm"))
    }

    fn cancel(&mut self) {
        let mut log = self.log.lock();
        if log.recording {
            log.recording = false;
            log.releases += 1;
        }
    }

    fn is_recording(&self) -> bool {
        self.log.lock().recording
    }
}

#[derive(Default)]
pub struct PlaybackLog {
    pub current: Option<String>,
    pub paused: bool,
    pub fail: bool,
    pub starts: Vec<String>,
    pub resumes: usize,
    pub ended: Option<EndedCallback>,
}

/// Playback engine that never makes a sound; `finish` simulates a clip end.
#[derive(Clone, Default)]
pub struct FakePlayback {
    pub log: Arc<Mutex<PlaybackLog>>,
}

impl FakePlayback {
    /// End the loaded clip naturally, firing the ended callback.
    pub fn finish(&self) {
        let (ext_id, callback) = {
            let mut log = self.log.lock();
            let Some(ext_id) = log.current.take() else {
                return;
            };
            (ext_id, log.ended.clone())
        };
        if let Some(callback) = callback {
            callback(&ext_id);
        }
    }

    pub fn current(&self) -> Option<String> {
        self.log.lock().current.clone()
    }
}

impl PlaybackEngine for FakePlayback {
    fn play(&mut self, ext_id: &str, _blob: AudioBlob) -> Result<(), PlaybackError> {
        let mut log = self.log.lock();
        if log.fail {
            log.current = None;
            return Err(PlaybackError::Decode("unsupported container".into()));
        }
        if log.current.as_deref() == Some(ext_id) && log.paused {
            log.resumes += 1;
        } else {
            log.current = Some(ext_id.to_string());
            log.starts.push(ext_id.to_string());
        }
        log.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut log = self.log.lock();
        if log.current.is_some() {
            log.paused = true;
        }
    }

    fn stop(&mut self) {
        let mut log = self.log.lock();
        log.current = None;
        log.paused = false;
    }

    fn currently_playing_id(&self) -> Option<String> {
        self.log.lock().current.clone()
    }

    fn on_ended(&mut self, callback: EndedCallback) {
        self.log.lock().ended = Some(callback);
    }
}

/// Store whose audio writes report success but persist nothing.
pub struct FlakyStore {
    pub inner: DatabaseStore,
}

impl StorageBackend for FlakyStore {
    fn write_audio(&mut self, _ext_id: &str, _blob: &AudioBlob, _ext: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn read_audio(&self, ext_id: &str, ext: &str) -> Result<Option<AudioBlob>, StorageError> {
        self.inner.read_audio(ext_id, ext)
    }

    fn delete_audio(&mut self, ext_id: &str, ext: &str) -> Result<(), StorageError> {
        self.inner.delete_audio(ext_id, ext)
    }

    fn read_meta(&self) -> Result<MetadataDocument, StorageError> {
        self.inner.read_meta()
    }

    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError> {
        self.inner.write_meta(doc)
    }
}

/// Which writes a `FailingStore` rejects.
#[derive(Default)]
pub struct Failures {
    pub audio_writes: bool,
    pub meta_writes: bool,
}

/// Store whose writes fail on demand, as a full or unplugged disk would.
pub struct FailingStore {
    pub inner: DatabaseStore,
    pub failures: Arc<Mutex<Failures>>,
}

impl StorageBackend for FailingStore {
    fn write_audio(&mut self, ext_id: &str, blob: &AudioBlob, ext: &str) -> Result<(), StorageError> {
        if self.failures.lock().audio_writes {
            return Err(StorageError::Io("no space left on device".into()));
        }
        self.inner.write_audio(ext_id, blob, ext)
    }

    fn read_audio(&self, ext_id: &str, ext: &str) -> Result<Option<AudioBlob>, StorageError> {
        self.inner.read_audio(ext_id, ext)
    }

    fn delete_audio(&mut self, ext_id: &str, ext: &str) -> Result<(), StorageError> {
        self.inner.delete_audio(ext_id, ext)
    }

    fn read_meta(&self) -> Result<MetadataDocument, StorageError> {
        self.inner.read_meta()
    }

    fn write_meta(&mut self, doc: &MetadataDocument) -> Result<(), StorageError> {
        if self.failures.lock().meta_writes {
            return Err(StorageError::Io("no space left on device".into()));
        }
        self.inner.write_meta(doc)
    }
}
