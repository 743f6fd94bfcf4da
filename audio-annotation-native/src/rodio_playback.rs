//! Clip playback via rodio.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use audio_annotation_core::models::blob::AudioBlob;
use audio_annotation_core::models::error::PlaybackError;
use audio_annotation_core::traits::playback_engine::{EndedCallback, PlaybackEngine};

/// How often a clip watcher checks whether its sink has drained.
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

struct LoadedClip {
    ext_id: String,
    sink: Arc<Sink>,
}

/// Plays one clip at a time on the default output device.
///
/// Every clip gets its own sink and a watcher thread. The watcher fires the
/// ended callback once the sink drains, unless the clip's generation has
/// been superseded by `stop` or another `play` in the meantime.
pub struct RodioPlayback {
    stream: OutputStream,
    current: Option<LoadedClip>,
    generation: Arc<AtomicU64>,
    on_ended: Option<EndedCallback>,
}

impl RodioPlayback {
    /// Open the default output device.
    pub fn new() -> Result<Self, PlaybackError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Device(format!("failed to open output stream: {}", e)))?;
        Ok(Self {
            stream,
            current: None,
            generation: Arc::new(AtomicU64::new(0)),
            on_ended: None,
        })
    }

    fn watch(&self, ext_id: String, sink: Arc<Sink>, generation: u64) {
        let current = Arc::clone(&self.generation);
        let callback = self.on_ended.clone();

        let spawned = thread::Builder::new()
            .name("rodio-clip-watch".into())
            .spawn(move || {
                loop {
                    thread::sleep(WATCH_INTERVAL);
                    if current.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    if sink.empty() {
                        break;
                    }
                }
                log::debug!("Clip for {} finished", ext_id);
                if let Some(callback) = callback {
                    callback(&ext_id);
                }
            });
        if let Err(e) = spawned {
            log::warn!("Failed to spawn clip watcher, end of clip will not be reported: {}", e);
        }
    }
}

impl PlaybackEngine for RodioPlayback {
    fn play(&mut self, ext_id: &str, blob: AudioBlob) -> Result<(), PlaybackError> {
        if let Some(loaded) = &self.current {
            if loaded.ext_id == ext_id && loaded.sink.is_paused() && !loaded.sink.empty() {
                loaded.sink.play();
                return Ok(());
            }
        }
        self.stop();

        let source = Decoder::new(Cursor::new(blob.bytes))
            .map_err(|e| PlaybackError::Decode(format!("{} ({})", e, blob.mime)))?;
        let sink = Arc::new(Sink::connect_new(self.stream.mixer()));
        sink.append(source);
        sink.play();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.watch(ext_id.to_string(), Arc::clone(&sink), generation);
        self.current = Some(LoadedClip {
            ext_id: ext_id.to_string(),
            sink,
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(loaded) = &self.current {
            loaded.sink.pause();
        }
    }

    fn stop(&mut self) {
        // Bump first so the watcher never reports a stopped clip as ended.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(loaded) = self.current.take() {
            loaded.sink.stop();
        }
    }

    fn currently_playing_id(&self) -> Option<String> {
        self.current
            .as_ref()
            .filter(|loaded| !loaded.sink.empty())
            .map(|loaded| loaded.ext_id.clone())
    }

    fn on_ended(&mut self, callback: EndedCallback) {
        self.on_ended = Some(callback);
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
