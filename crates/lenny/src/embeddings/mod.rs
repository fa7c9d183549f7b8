//! Text embeddings for retrieval

mod ollama;
mod onnx_embedder;

pub use ollama::OllamaEmbedder;
pub use onnx_embedder::OnnxEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OnnxEmbedder`: local all-MiniLM-L6-v2 (384 dimensions)
/// - `OllamaEmbedder`: Ollama `/api/embeddings`
///
/// The index builder and the query path must use the same provider, otherwise
/// distances are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Build the configured embedding provider
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.backend {
        EmbeddingBackend::Onnx => Arc::new(OnnxEmbedder::new(config).await?),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
    };

    tracing::info!(
        "Embedding provider: {} ({} dimensions)",
        embedder.name(),
        embedder.dimensions()
    );

    Ok(embedder)
}
