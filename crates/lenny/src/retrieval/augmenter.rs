//! Nearest-chunk context for a question

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};

use super::index::FlatL2Index;
use super::store::ChunkStore;
use super::ContextRetriever;

/// Embeds the question and returns the nearest stored chunks
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: FlatL2Index,
    chunks: ChunkStore,
    top_k: usize,
}

impl Retriever {
    /// Pair an index with its chunk texts
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: FlatL2Index,
        chunks: ChunkStore,
        top_k: usize,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(Error::vector_index(format!(
                "Index holds {} vectors but the chunk store holds {} texts",
                index.len(),
                chunks.len()
            )));
        }
        if index.dimensions() != embedder.dimensions() {
            return Err(Error::vector_index(format!(
                "Index has {} dimensions but embedder {} produces {}",
                index.dimensions(),
                embedder.name(),
                embedder.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            index,
            chunks,
            top_k,
        })
    }

    /// Load the index and chunk files named in the configuration
    pub fn load(config: &RetrievalConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let index = FlatL2Index::load(&config.index_path)?;
        let chunks = ChunkStore::load(&config.chunks_path)?;

        tracing::info!(
            "Loaded {} chunks from {} and {}",
            chunks.len(),
            config.index_path.display(),
            config.chunks_path.display()
        );

        Self::new(embedder, index, chunks, config.top_k)
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunks are indexed
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `top_k` nearest chunk texts, nearest first
    pub async fn nearest(&self, question: &str) -> Result<Vec<&str>> {
        let query = self.embedder.embed(question).await?;
        let hits = self.index.search(&query, self.top_k)?;

        hits.into_iter()
            .map(|(ordinal, distance)| {
                tracing::debug!("Chunk {} at distance {:.4}", ordinal, distance);
                self.chunks.text(ordinal).ok_or_else(|| {
                    Error::vector_index(format!("No chunk text for ordinal {}", ordinal))
                })
            })
            .collect()
    }
}

#[async_trait]
impl ContextRetriever for Retriever {
    async fn retrieve(&self, question: &str) -> Result<String> {
        Ok(self.nearest(question).await?.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps a handful of known words onto fixed points
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.contains("cat") => vec![0.0, 0.0],
                t if t.contains("dog") => vec![5.0, 0.0],
                t if t.contains("fish") => vec![0.0, 5.0],
                _ => vec![2.0, 2.0],
            })
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    fn retriever(top_k: usize) -> Retriever {
        let mut index = FlatL2Index::new(2);
        index
            .add_all(vec![vec![0.0, 0.0], vec![5.0, 0.0], vec![0.0, 5.0], vec![1.0, 0.0]])
            .unwrap();
        let chunks = ChunkStore::from_texts(
            ["Cats purr.", "Dogs bark.", "Fish swim.", "Kittens play."]
                .into_iter()
                .map(String::from),
        );
        Retriever::new(Arc::new(KeywordEmbedder), index, chunks, top_k).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_joins_nearest_with_newlines() {
        let context = retriever(2).retrieve("tell me about a cat").await.unwrap();
        assert_eq!(context, "Cats purr.\nKittens play.");
    }

    #[tokio::test]
    async fn test_retrieve_returns_exactly_k() {
        let retriever = retriever(3);
        let nearest = retriever.nearest("a dog").await.unwrap();
        assert_eq!(nearest, vec!["Dogs bark.", "Kittens play.", "Cats purr."]);
    }

    #[tokio::test]
    async fn test_small_index_returns_everything() {
        let retriever = retriever(10);
        let nearest = retriever.nearest("fish").await.unwrap();
        assert_eq!(nearest.len(), 4);
        assert_eq!(nearest[0], "Fish swim.");
    }

    #[test]
    fn test_mismatched_files_are_rejected() {
        let index = FlatL2Index::new(2);
        let chunks = ChunkStore::from_texts(vec!["orphan".to_string()]);
        assert!(Retriever::new(Arc::new(KeywordEmbedder), index, chunks, 5).is_err());

        let index = FlatL2Index::new(3);
        assert!(Retriever::new(Arc::new(KeywordEmbedder), index, ChunkStore::default(), 5).is_err());
    }
}
