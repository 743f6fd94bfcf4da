pub mod annotation_delegate;
pub mod capture_engine;
pub mod playback_engine;
pub mod storage_backend;
