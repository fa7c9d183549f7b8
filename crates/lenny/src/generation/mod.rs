//! Answer generation against a local model runtime

pub mod cleaner;
pub mod invoker;
pub mod ollama;
pub mod pipeline;
pub mod prompt;

pub use cleaner::clean_output;
pub use invoker::{Invocation, ModelInvoker, ProcessInvoker};
pub use ollama::{OllamaClient, OllamaInvoker};
pub use pipeline::{AnswerPipeline, Fallback};
pub use prompt::PromptBuilder;
