//! Retrieval augmentation over a pre-built chunk index

pub mod augmenter;
pub mod index;
pub mod store;

pub use augmenter::Retriever;
pub use index::FlatL2Index;
pub use store::{ChunkStore, TextChunk};

use async_trait::async_trait;

use crate::error::Result;

/// Supplies grounding context for a question
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Context text to splice into the answer prompt
    async fn retrieve(&self, question: &str) -> Result<String>;
}
