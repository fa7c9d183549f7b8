//! Chat request and response bodies

use serde::{Deserialize, Serialize};

/// Form body of `POST /chat`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatForm {
    /// The user's message; a missing field reads as empty
    #[serde(default)]
    pub message: String,
}

/// JSON body answered by `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// Answer text, never empty
    pub response: String,
}

impl ChatResponse {
    /// Wrap an answer
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
