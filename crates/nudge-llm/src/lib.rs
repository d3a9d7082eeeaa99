pub mod completion;
pub mod error;
pub mod gate;
pub mod json;
pub mod ollama;
pub mod prompts;

pub use completion::{CompletionRequest, CompletionService, ScriptedCompletion};
pub use error::{LlmError, Result};
pub use gate::{AdmissionGate, GatedCompletion};
pub use json::parse_json_object;
pub use ollama::OllamaClient;
