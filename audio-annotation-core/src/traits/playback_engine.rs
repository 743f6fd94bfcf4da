use std::sync::Arc;

use crate::models::blob::AudioBlob;
use crate::models::error::PlaybackError;

/// Callback invoked with the node id when a clip reaches its natural end.
pub type EndedCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Plays at most one clip at a time.
///
/// Implemented by:
/// - `RodioPlayback` (audio-annotation-native)
pub trait PlaybackEngine {
    /// Stop whatever is playing and start `blob` for `ext_id`.
    ///
    /// Resumes instead of restarting when `ext_id` is the paused current clip.
    fn play(&mut self, ext_id: &str, blob: AudioBlob) -> Result<(), PlaybackError>;

    /// Pause the current clip. No-op when nothing is playing.
    fn pause(&mut self);

    /// Halt and unload the current clip without an ended notification.
    fn stop(&mut self);

    /// Id of the loaded clip, playing or paused.
    fn currently_playing_id(&self) -> Option<String>;

    /// Register the end-of-clip callback. Fires once per natural end; the
    /// callback may run on an engine thread.
    fn on_ended(&mut self, callback: EndedCallback);
}
