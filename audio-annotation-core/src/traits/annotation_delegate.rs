use crate::models::error::ErrorCode;
use crate::models::state::NodeState;

/// Context attached to an error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Node the failed operation targeted, if any.
    pub ext_id: Option<String>,
    pub message: String,
}

/// Event delegate for annotation layer notifications.
///
/// `on_state_changed` may be called from a playback engine thread when a clip
/// ends naturally. Implementations should marshal to the UI thread if needed.
pub trait AnnotationDelegate: Send + Sync {
    /// Called whenever a node enters a new state (including at bind time).
    fn on_state_changed(&self, ext_id: &str, state: NodeState);

    /// Called once per failed operation.
    fn on_error(&self, code: ErrorCode, context: &ErrorContext);
}
