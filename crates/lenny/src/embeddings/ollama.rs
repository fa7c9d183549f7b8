//! Embeddings served by a local Ollama instance

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::generation::OllamaClient;

use super::EmbeddingProvider;

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::from_client(
            OllamaClient::new(&config.base_url)?,
            config.model.clone(),
            config.dimensions,
        ))
    }

    /// Create from an existing client
    pub fn from_client(client: OllamaClient, model: String, dimensions: usize) -> Self {
        Self {
            client,
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.client.embed(&self.model, text).await?;

        if embedding.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dimensions
            )));
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
