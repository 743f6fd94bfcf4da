use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Stable error codes surfaced to the UI layer through
/// `AnnotationDelegate::on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_MIC_DENIED")]
    MicDenied,
    #[serde(rename = "E_WRITE_FAIL")]
    WriteFail,
    #[serde(rename = "E_WRITE_VERIFY_FAIL")]
    WriteVerifyFail,
    #[serde(rename = "E_READ_FAIL")]
    ReadFail,
    #[serde(rename = "E_BUSY")]
    Busy,
    #[serde(rename = "E_PLAYBACK_FAIL")]
    PlaybackFail,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MicDenied => "E_MIC_DENIED",
            Self::WriteFail => "E_WRITE_FAIL",
            Self::WriteVerifyFail => "E_WRITE_VERIFY_FAIL",
            Self::ReadFail => "E_READ_FAIL",
            Self::Busy => "E_BUSY",
            Self::PlaybackFail => "E_PLAYBACK_FAIL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a `CaptureEngine`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("a recording session is already active")]
    Busy,

    #[error("no recording session is active")]
    NotRecording,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no input device available")]
    DeviceNotAvailable,

    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

/// Errors raised by a `PlaybackEngine`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("output device error: {0}")]
    Device(String),
}

/// Errors raised by a `StorageBackend` once it holds a live target.
///
/// "Not found" is never an error; it resolves to `None` or an empty document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("no folder access")]
    NoFolderAccess,
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Errors returned by the annotation controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("failed to write audio for {ext_id}: {source}")]
    WriteFailed { ext_id: String, source: StorageError },

    #[error("failed to write metadata: {source}")]
    MetadataFailed { source: StorageError },

    #[error("audio for {ext_id} could not be read back after writing")]
    VerifyFailed { ext_id: String },

    #[error("failed to read {what}: {source}")]
    ReadFailed { what: String, source: StorageError },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnnotationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Capture(CaptureError::PermissionDenied | CaptureError::DeviceNotAvailable) => {
                ErrorCode::MicDenied
            }
            Self::Capture(CaptureError::EncodingFailed(_)) => ErrorCode::WriteFail,
            Self::Capture(CaptureError::Busy | CaptureError::NotRecording) => ErrorCode::Busy,
            Self::Playback(_) => ErrorCode::PlaybackFail,
            Self::WriteFailed { .. } | Self::MetadataFailed { .. } => ErrorCode::WriteFail,
            Self::VerifyFailed { .. } => ErrorCode::WriteVerifyFail,
            Self::ReadFailed { .. } | Self::InvalidConfig(_) => ErrorCode::ReadFail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_as_wire_strings() {
        assert_eq!(ErrorCode::MicDenied.to_string(), "E_MIC_DENIED");
        assert_eq!(
            serde_json::to_string(&ErrorCode::WriteVerifyFail).unwrap(),
            "\"E_WRITE_VERIFY_FAIL\""
        );
    }

    #[test]
    fn guard_errors_map_to_busy() {
        assert_eq!(AnnotationError::from(CaptureError::Busy).code(), ErrorCode::Busy);
        assert_eq!(AnnotationError::from(CaptureError::NotRecording).code(), ErrorCode::Busy);
        assert_eq!(
            AnnotationError::from(CaptureError::PermissionDenied).code(),
            ErrorCode::MicDenied
        );
    }
}
