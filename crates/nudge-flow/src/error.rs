//! Error types for conversational flows.

use nudge_core::NudgeError;

/// Errors raised while advancing a flow.
///
/// These never reach the end user as-is: the dispatcher logs them and turns
/// them into a short reply, keeping the flow state when it can.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Core(#[from] NudgeError),
    #[error("session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
