//! lenny: chat front-end for a locally running LLM
//!
//! Forwards chat messages to an external text-generation process and returns the
//! cleaned answer. Answers can go through a bounded generate → evaluate → refine
//! loop, and prompts can be grounded with the nearest chunks of a pre-built
//! PDF index.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod retrieval;
pub mod server;
pub mod telemetry;
pub mod types;

pub use config::LennyConfig;
pub use error::{Error, Result};
pub use generation::{AnswerPipeline, Invocation, ModelInvoker};
pub use types::chat::{ChatForm, ChatResponse};
