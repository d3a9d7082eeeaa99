//! Error types for generative model access.

use nudge_core::error::NudgeError;

/// Errors from a completion call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Request(String),
    #[error("Completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed completion response: {0}")]
    Malformed(String),
    #[error("No model configured")]
    NoModel,
    #[error("Admission gate closed")]
    GateClosed,
    #[error("Core error: {0}")]
    Core(#[from] NudgeError),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Status {
            status: 500,
            body: "model not loaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Completion service returned status 500: model not loaded"
        );
        assert_eq!(LlmError::NoModel.to_string(), "No model configured");
    }

    #[test]
    fn test_llm_error_from_core() {
        let err: LlmError = NudgeError::Config("bad url".to_string()).into();
        assert!(matches!(err, LlmError::Core(_)));
    }
}
