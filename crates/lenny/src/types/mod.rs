//! Wire types for the chat API

pub mod chat;

pub use chat::{ChatForm, ChatResponse};
