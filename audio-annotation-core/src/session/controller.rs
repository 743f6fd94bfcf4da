use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::gesture::recognizer::{Gesture, GestureRecognizer};
use crate::models::blob::{extension_for_mime, mime_for_extension, AudioBlob, ExportedClip};
use crate::models::config::AnnotationConfig;
use crate::models::error::{AnnotationError, CaptureError, StorageError};
use crate::models::record::{MetadataDocument, NodeAudioRecord};
use crate::models::state::NodeState;
use crate::processing::wav_format::probe_duration_secs;
use crate::storage::audio_file_stem;
use crate::storage::store::AudioStore;
use crate::traits::annotation_delegate::{AnnotationDelegate, ErrorContext};
use crate::traits::capture_engine::CaptureEngine;
use crate::traits::playback_engine::PlaybackEngine;
use crate::traits::storage_backend::{FolderPicker, StorageBackend};

/// State shared with the playback engine's ended callback.
struct Shared {
    states: HashMap<String, NodeState>,
    delegate: Option<Arc<dyn AnnotationDelegate>>,
}

/// Per-node annotation state machine.
///
/// Owns one `NodeState` per node id and the in-memory metadata cache, and
/// routes gestures to the capture engine, the playback engine and storage:
/// ```text
/// pointer events → [GestureRecognizer] → tap / long-press
///                                            │
///                  ┌─────────────────────────┼───────────────────┐
///                  ↓                         ↓                   ↓
///           [CaptureEngine]          [PlaybackEngine]     [StorageBackend]
///         (blob on stop) ──write → read back → verify → commit metadata──┘
/// ```
///
/// Calls block until the underlying operation completes. Only the clip-ended
/// notification arrives from another thread, and it only touches the shared
/// state table.
pub struct AnnotationController<S: StorageBackend, C: CaptureEngine, P: PlaybackEngine> {
    store: S,
    capture: C,
    playback: P,
    config: AnnotationConfig,
    shared: Arc<Mutex<Shared>>,
    gestures: HashMap<String, GestureRecognizer>,
    metadata: MetadataDocument,
    recording: Option<String>,
    disposed: bool,
}

/// Annotation layer over the folder/database store.
pub type AudioLayer<C, P> = AnnotationController<AudioStore, C, P>;

impl<C: CaptureEngine, P: PlaybackEngine> AnnotationController<AudioStore, C, P> {
    /// Open the store described by `config` and build a controller over it.
    pub fn open(
        config: AnnotationConfig,
        capture: C,
        playback: P,
        picker: Option<Box<dyn FolderPicker>>,
    ) -> Result<Self, AnnotationError> {
        let store = AudioStore::open(&config, picker).map_err(|source| AnnotationError::ReadFailed {
            what: config.database_path.display().to_string(),
            source,
        })?;
        Self::new(store, capture, playback, config)
    }
}

impl<S: StorageBackend, C: CaptureEngine, P: PlaybackEngine> AnnotationController<S, C, P> {
    /// Build a controller, reacquire any remembered folder and load metadata.
    pub fn new(mut store: S, capture: C, mut playback: P, config: AnnotationConfig) -> Result<Self, AnnotationError> {
        config.validate().map_err(AnnotationError::InvalidConfig)?;

        let shared = Arc::new(Mutex::new(Shared {
            states: HashMap::new(),
            delegate: None,
        }));

        let ended_shared = Arc::clone(&shared);
        playback.on_ended(Arc::new(move |ext_id: &str| {
            let delegate = {
                let mut guard = ended_shared.lock();
                let shared = &mut *guard;
                match shared.states.get_mut(ext_id) {
                    Some(state) if state.is_playing() => {
                        *state = NodeState::HasAudio;
                        shared.delegate.clone()
                    }
                    _ => return,
                }
            };
            log::debug!("Clip for {} ended", ext_id);
            if let Some(delegate) = delegate {
                delegate.on_state_changed(ext_id, NodeState::HasAudio);
            }
        }));

        store.initialize();
        let metadata = store.read_meta().map_err(|source| AnnotationError::ReadFailed {
            what: "metadata".into(),
            source,
        })?;
        log::info!(
            "Annotation layer ready ({} metadata entries, folder access: {})",
            metadata.nodes.len(),
            store.has_access()
        );

        Ok(Self {
            store,
            capture,
            playback,
            config,
            shared,
            gestures: HashMap::new(),
            metadata,
            recording: None,
            disposed: false,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn AnnotationDelegate>) {
        self.shared.lock().delegate = Some(delegate);
    }

    // --- Binding ---

    /// Bind every element whose id `ext_id_of` yields. Returns the bound ids.
    pub fn attach<T, I, F>(&mut self, elements: I, ext_id_of: F) -> Vec<String>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        let mut bound = Vec::new();
        for element in elements {
            let ext_id = ext_id_of(&element);
            self.bind(&ext_id);
            bound.push(ext_id);
        }
        bound
    }

    /// Start tracking `ext_id`, deriving its state from metadata.
    ///
    /// Rebinding keeps the node's current state.
    pub fn bind(&mut self, ext_id: &str) {
        let long_press = Duration::from_millis(self.config.long_press_ms);
        self.gestures
            .entry(ext_id.to_string())
            .or_insert_with(|| GestureRecognizer::new(long_press));
        let current = self.shared.lock().states.get(ext_id).copied();
        let state = current.unwrap_or_else(|| NodeState::derived(self.metadata.has_record(ext_id)));
        self.set_state(ext_id, state);
    }

    /// Stop tracking `ext_id`, cancelling its recording or playback.
    pub fn unbind(&mut self, ext_id: &str) {
        self.gestures.remove(ext_id);
        if self.recording.as_deref() == Some(ext_id) {
            self.capture.cancel();
            self.recording = None;
        }
        self.stop_playback_of(ext_id);
        self.shared.lock().states.remove(ext_id);
    }

    // --- Gesture routing ---

    pub fn pointer_down(&mut self, ext_id: &str, now: Instant) {
        if let Some(recognizer) = self.gestures.get_mut(ext_id) {
            recognizer.pointer_down(now);
        }
    }

    /// Release on `ext_id`; dispatches the recognized gesture.
    pub fn pointer_up(&mut self, ext_id: &str, now: Instant) -> Result<Option<Gesture>, AnnotationError> {
        let Some(gesture) = self.gestures.get_mut(ext_id).and_then(|r| r.pointer_up(now)) else {
            return Ok(None);
        };
        self.dispatch(ext_id, gesture)?;
        Ok(Some(gesture))
    }

    pub fn pointer_leave(&mut self, ext_id: &str) {
        if let Some(recognizer) = self.gestures.get_mut(ext_id) {
            recognizer.pointer_leave();
        }
    }

    /// Fire long-presses whose hold time has elapsed. Returns the nodes that
    /// fired; failures go to the delegate.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let fired: Vec<String> = self
            .gestures
            .iter_mut()
            .filter_map(|(ext_id, recognizer)| match recognizer.poll(now) {
                Some(Gesture::LongPress) => Some(ext_id.clone()),
                _ => None,
            })
            .collect();
        for ext_id in &fired {
            let _ = self.handle_long_press(ext_id);
        }
        fired
    }

    /// Earliest pending long-press deadline, for scheduling the next `tick`.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.gestures.values().filter_map(GestureRecognizer::deadline).min()
    }

    fn dispatch(&mut self, ext_id: &str, gesture: Gesture) -> Result<(), AnnotationError> {
        match gesture {
            Gesture::Tap => self.handle_tap(ext_id),
            Gesture::LongPress => self.handle_long_press(ext_id),
        }
    }

    pub fn handle_tap(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let result = match self.state(ext_id) {
            NodeState::Idle => self.begin_recording(ext_id),
            NodeState::Recording => self.finish_recording(ext_id),
            NodeState::HasAudio | NodeState::Paused => self.begin_playback(ext_id),
            NodeState::Playing => {
                self.pause();
                Ok(())
            }
            NodeState::Error => {
                log::debug!("Ignoring tap on {} in error state", ext_id);
                Ok(())
            }
        };
        self.reported(Some(ext_id), result)
    }

    pub fn handle_long_press(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        if !self.state(ext_id).is_deletable() {
            return Ok(());
        }
        let result = self.remove(ext_id);
        self.reported(Some(ext_id), result)
    }

    // --- Direct operations ---

    pub fn start_recording(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let result = self.begin_recording(ext_id);
        self.reported(Some(ext_id), result)
    }

    /// Finalize the recording, then write, verify and commit it.
    pub fn stop_recording(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let result = self.finish_recording(ext_id);
        self.reported(Some(ext_id), result)
    }

    pub fn play(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let result = self.begin_playback(ext_id);
        self.reported(Some(ext_id), result)
    }

    /// Pause whichever node is playing. No-op when nothing is.
    pub fn pause(&mut self) {
        let playing = self.playing_node();
        self.playback.pause();
        if let Some(ext_id) = playing {
            self.set_state(&ext_id, NodeState::Paused);
        }
    }

    /// Remove the node's audio and tombstone its entry.
    pub fn delete(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let result = self.remove(ext_id);
        self.reported(Some(ext_id), result)
    }

    /// Attach an external file's bytes to `ext_id` as if freshly recorded.
    ///
    /// The extension comes from `file_name`, else from `mime`, else the
    /// configured default.
    pub fn import_file(
        &mut self,
        ext_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<(), AnnotationError> {
        let result = self.import_bytes(ext_id, file_name, bytes, mime);
        self.reported(Some(ext_id), result)
    }

    pub fn import_path(&mut self, ext_id: &str, path: &Path) -> Result<(), AnnotationError> {
        let result = fs::read(path)
            .map_err(|e| AnnotationError::ReadFailed {
                what: path.display().to_string(),
                source: e.into(),
            })
            .and_then(|bytes| {
                let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                self.import_bytes(ext_id, &file_name, bytes, None)
            });
        self.reported(Some(ext_id), result)
    }

    /// The node's clip, named `<file-stem>.<ext>`. `None` when it has no audio.
    pub fn export(&mut self, ext_id: &str) -> Result<Option<ExportedClip>, AnnotationError> {
        let result = self.exported(ext_id);
        self.reported(Some(ext_id), result)
    }

    /// Save the node's clip into `dir`. Returns the written path.
    pub fn download(&mut self, ext_id: &str, dir: &Path) -> Result<Option<PathBuf>, AnnotationError> {
        let result = self.exported(ext_id).and_then(|clip| {
            let Some(clip) = clip else {
                return Ok(None);
            };
            let path = dir.join(&clip.file_name);
            fs::write(&path, &clip.blob.bytes).map_err(|e| AnnotationError::WriteFailed {
                ext_id: ext_id.to_string(),
                source: StorageError::Io(format!("failed to write {}: {}", path.display(), e)),
            })?;
            log::info!("Downloaded {} to {}", ext_id, path.display());
            Ok(Some(path))
        });
        self.reported(Some(ext_id), result)
    }

    // --- Storage ---

    /// Ask the user for a folder. After a grant, metadata is reloaded from
    /// the new target and every bound node is re-derived.
    pub fn request_folder_permission(&mut self) -> bool {
        if !self.store.request_folder_permission() {
            return false;
        }
        let _ = self.load_metadata();
        true
    }

    pub fn has_folder_access(&self) -> bool {
        self.store.has_access()
    }

    /// Reload the metadata document and re-derive every bound node.
    pub fn load_metadata(&mut self) -> Result<(), AnnotationError> {
        let result = self.reload();
        self.reported(None, result)
    }

    /// Persist the in-memory document. Needed only with `auto_save_metadata` off.
    pub fn save_metadata(&mut self) -> Result<(), AnnotationError> {
        let result = self
            .store
            .write_meta(&self.metadata)
            .map_err(|source| AnnotationError::MetadataFailed { source });
        self.reported(None, result)
    }

    // --- Queries ---

    /// Current state of `ext_id`; unbound nodes report their derived state.
    pub fn state(&self, ext_id: &str) -> NodeState {
        let current = self.shared.lock().states.get(ext_id).copied();
        current.unwrap_or_else(|| NodeState::derived(self.metadata.has_record(ext_id)))
    }

    pub fn metadata(&self) -> &MetadataDocument {
        &self.metadata
    }

    pub fn recording_node(&self) -> Option<&str> {
        self.recording.as_deref()
    }

    pub fn is_bound(&self, ext_id: &str) -> bool {
        self.gestures.contains_key(ext_id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stop playback, cancel any recording and drop all bindings. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.playback.currently_playing_id().is_some() {
            self.playback.stop();
        }
        if let Some(ext_id) = self.recording.take() {
            log::info!("Discarding unfinished recording for {}", ext_id);
            self.capture.cancel();
        }
        self.gestures.clear();
        self.shared.lock().states.clear();
        log::debug!("Annotation layer disposed");
    }

    // --- Internal helpers ---

    fn begin_recording(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        if self.recording.is_some() || self.capture.is_recording() {
            return Err(CaptureError::Busy.into());
        }
        self.capture.start()?;
        self.stop_playback_of(ext_id);
        self.recording = Some(ext_id.to_string());
        self.set_state(ext_id, NodeState::Recording);
        Ok(())
    }

    fn finish_recording(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        if self.recording.as_deref() != Some(ext_id) {
            return Err(CaptureError::NotRecording.into());
        }
        self.recording = None;
        let blob = match self.capture.stop() {
            Ok(blob) => blob,
            Err(e) => {
                self.set_state(ext_id, NodeState::Error);
                return Err(e.into());
            }
        };
        self.commit_audio(ext_id, blob, None)
    }

    fn begin_playback(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        if self.recording.as_deref() == Some(ext_id) {
            return Err(CaptureError::Busy.into());
        }
        let ext = self.extension_of(ext_id);
        let blob = self
            .store
            .read_audio(ext_id, &ext)
            .map_err(|source| AnnotationError::ReadFailed {
                what: format!("audio for {}", ext_id),
                source,
            })?;
        let Some(blob) = blob else {
            return self.heal_missing(ext_id);
        };

        let played = self.playback.play(ext_id, blob);
        // The engine unloads any other clip even when this one fails to start.
        self.demote_others(ext_id);
        played?;
        self.set_state(ext_id, NodeState::Playing);
        Ok(())
    }

    fn remove(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        let state = self.state(ext_id);
        if state.is_recording() {
            return Err(CaptureError::Busy.into());
        }
        if state.is_idle() && !self.metadata.has_record(ext_id) {
            return Ok(());
        }

        self.stop_playback_of(ext_id);
        let ext = self.extension_of(ext_id);
        self.store
            .delete_audio(ext_id, &ext)
            .map_err(|source| AnnotationError::WriteFailed {
                ext_id: ext_id.to_string(),
                source,
            })?;

        let mut next = self.metadata.clone();
        next.tombstone(ext_id);
        self.persist(next)?;
        log::info!("Deleted audio for {}", ext_id);
        self.set_state(ext_id, NodeState::Idle);
        Ok(())
    }

    fn import_bytes(
        &mut self,
        ext_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<(), AnnotationError> {
        if self.recording.as_deref() == Some(ext_id) {
            return Err(CaptureError::Busy.into());
        }
        let mime = mime.map(str::trim).filter(|m| !m.is_empty());
        let ext = file_extension(file_name)
            .or_else(|| mime.and_then(extension_for_mime).map(String::from))
            .unwrap_or_else(|| self.config.default_extension.clone());
        let mime = mime
            .or_else(|| mime_for_extension(&ext))
            .unwrap_or("application/octet-stream")
            .to_string();

        self.stop_playback_of(ext_id);
        self.commit_audio(ext_id, AudioBlob::new(bytes, mime), Some(ext))
    }

    fn exported(&self, ext_id: &str) -> Result<Option<ExportedClip>, AnnotationError> {
        let ext = self.extension_of(ext_id);
        let blob = self
            .store
            .read_audio(ext_id, &ext)
            .map_err(|source| AnnotationError::ReadFailed {
                what: format!("audio for {}", ext_id),
                source,
            })?;
        Ok(blob.map(|blob| ExportedClip {
            file_name: format!("{}.{}", audio_file_stem(ext_id), ext),
            blob,
        }))
    }

    /// Write `blob`, read it back, and only then commit the metadata record.
    fn commit_audio(&mut self, ext_id: &str, blob: AudioBlob, ext: Option<String>) -> Result<(), AnnotationError> {
        let ext = ext
            .or_else(|| extension_for_mime(&blob.mime).map(String::from))
            .unwrap_or_else(|| self.config.default_extension.clone());

        if let Err(source) = self.store.write_audio(ext_id, &blob, &ext) {
            self.set_state(ext_id, NodeState::Error);
            return Err(AnnotationError::WriteFailed {
                ext_id: ext_id.to_string(),
                source,
            });
        }

        let verified = match self.store.read_audio(ext_id, &ext) {
            Ok(Some(read)) => read.digest() == blob.digest(),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Read-back of {} failed: {}", ext_id, e);
                false
            }
        };
        if !verified {
            self.discard_unverified(ext_id, &ext);
            self.set_state(ext_id, NodeState::Error);
            return Err(AnnotationError::VerifyFailed {
                ext_id: ext_id.to_string(),
            });
        }

        let duration = probe_duration_secs(&blob);
        let fresh = NodeAudioRecord::new(ext_id, &audio_file_stem(ext_id), &ext, duration, &blob.mime);
        let record = match self.metadata.record(ext_id) {
            Some(previous) => previous.superseded_by(fresh),
            None => fresh,
        };
        let mut next = self.metadata.clone();
        next.upsert(record);
        if let Err(e) = self.persist(next) {
            self.set_state(ext_id, NodeState::Error);
            return Err(e);
        }

        log::info!(
            "Stored {} bytes of {} for {} ({:.2}s)",
            blob.len(),
            blob.mime,
            ext_id,
            duration
        );
        log::debug!("{} sha256 {}", ext_id, blob.checksum());
        self.set_state(ext_id, NodeState::HasAudio);
        Ok(())
    }

    /// After a failed read-back no record may point at the blob.
    fn discard_unverified(&mut self, ext_id: &str, ext: &str) {
        log::warn!("Audio for {} did not survive read-back", ext_id);
        if let Err(e) = self.store.delete_audio(ext_id, ext) {
            log::warn!("Failed to remove unverified audio for {}: {}", ext_id, e);
        }
        if !self.metadata.has_record(ext_id) {
            return;
        }
        let mut next = self.metadata.clone();
        next.tombstone(ext_id);
        if let Err(e) = self.persist(next) {
            log::warn!("Failed to tombstone {}: {}", ext_id, e);
        }
    }

    /// The node's blob vanished behind our back: tombstone and go idle.
    fn heal_missing(&mut self, ext_id: &str) -> Result<(), AnnotationError> {
        log::warn!("Audio for {} is missing, clearing its entry", ext_id);
        let mut next = self.metadata.clone();
        next.tombstone(ext_id);
        self.persist(next)?;
        self.set_state(ext_id, NodeState::Idle);
        Ok(())
    }

    fn reload(&mut self) -> Result<(), AnnotationError> {
        let doc = self.store.read_meta().map_err(|source| AnnotationError::ReadFailed {
            what: "metadata".into(),
            source,
        })?;
        self.metadata = doc;

        if self.playing_or_paused() {
            self.playback.stop();
        }
        let bound: Vec<String> = self.shared.lock().states.keys().cloned().collect();
        for ext_id in bound {
            if self.recording.as_deref() == Some(ext_id.as_str()) {
                continue;
            }
            let state = NodeState::derived(self.metadata.has_record(&ext_id));
            self.set_state(&ext_id, state);
        }
        Ok(())
    }

    /// Adopt `next` as the cache, writing it through when auto-save is on.
    fn persist(&mut self, next: MetadataDocument) -> Result<(), AnnotationError> {
        if self.config.auto_save_metadata {
            self.store
                .write_meta(&next)
                .map_err(|source| AnnotationError::MetadataFailed { source })?;
        }
        self.metadata = next;
        Ok(())
    }

    fn extension_of(&self, ext_id: &str) -> String {
        self.metadata
            .record(ext_id)
            .and_then(NodeAudioRecord::extension)
            .unwrap_or(self.config.default_extension.as_str())
            .to_string()
    }

    fn stop_playback_of(&mut self, ext_id: &str) {
        if self.playback.currently_playing_id().as_deref() == Some(ext_id) {
            self.playback.stop();
        }
    }

    fn playing_node(&self) -> Option<String> {
        self.shared
            .lock()
            .states
            .iter()
            .find(|(_, state)| state.is_playing())
            .map(|(ext_id, _)| ext_id.clone())
    }

    fn playing_or_paused(&self) -> bool {
        self.shared
            .lock()
            .states
            .values()
            .any(|state| matches!(state, NodeState::Playing | NodeState::Paused))
    }

    /// Every other playing node loses the output to `ext_id`.
    fn demote_others(&self, ext_id: &str) {
        let others: Vec<String> = self
            .shared
            .lock()
            .states
            .iter()
            .filter(|(id, state)| state.is_playing() && id.as_str() != ext_id)
            .map(|(id, _)| id.clone())
            .collect();
        for other in others {
            self.set_state(&other, NodeState::Paused);
        }
    }

    fn set_state(&self, ext_id: &str, state: NodeState) {
        let delegate = {
            let mut shared = self.shared.lock();
            shared.states.insert(ext_id.to_string(), state);
            shared.delegate.clone()
        };
        log::debug!("{} → {}", ext_id, state);
        if let Some(delegate) = delegate {
            delegate.on_state_changed(ext_id, state);
        }
    }

    fn reported<T>(&self, ext_id: Option<&str>, result: Result<T, AnnotationError>) -> Result<T, AnnotationError> {
        if let Err(e) = &result {
            log::warn!("{} ({})", e, e.code());
            let delegate = self.shared.lock().delegate.clone();
            if let Some(delegate) = delegate {
                let context = ErrorContext {
                    ext_id: ext_id.map(String::from),
                    message: e.to_string(),
                };
                delegate.on_error(e.code(), &context);
            }
        }
        result
    }
}

impl<S: StorageBackend, C: CaptureEngine, P: PlaybackEngine> Drop for AnnotationController<S, C, P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Lower-cased extension of `file_name`, if it looks like one.
fn file_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
