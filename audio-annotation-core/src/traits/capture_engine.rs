use crate::models::blob::AudioBlob;
use crate::models::error::CaptureError;

/// Microphone capture producing one blob per recording session.
///
/// Implemented by:
/// - `CpalCapture` (audio-annotation-native)
pub trait CaptureEngine {
    /// Acquire the microphone and start buffering.
    ///
    /// Fails with `Busy` while a session is active and with
    /// `PermissionDenied` when access is refused.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Finalize the active session into a single blob and release the microphone.
    fn stop(&mut self) -> Result<AudioBlob, CaptureError>;

    /// Discard the active session, if any, releasing the microphone.
    fn cancel(&mut self);

    fn is_recording(&self) -> bool;
}
