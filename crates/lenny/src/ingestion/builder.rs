//! Index build orchestration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::retrieval::{ChunkStore, FlatL2Index};

use super::chunker::SentenceChunker;
use super::parser::PdfExtractor;

/// Summary of a finished build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Pages in the source document, when built from a PDF
    pub pages: Option<usize>,
    /// Characters of extracted text
    pub characters: usize,
    /// Chunks written
    pub chunks: usize,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Where the vector index was written
    pub index_path: PathBuf,
    /// Where the chunk texts were written
    pub chunks_path: PathBuf,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

/// Builds the vector index and chunk store for one document
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: SentenceChunker,
    batch_size: usize,
}

impl IndexBuilder {
    /// Create a builder
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chunker: SentenceChunker, batch_size: usize) -> Self {
        Self {
            embedder,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Build from a PDF file
    pub async fn build(
        &self,
        pdf_path: &Path,
        index_path: &Path,
        chunks_path: &Path,
        on_progress: impl FnMut(usize, usize),
    ) -> Result<BuildReport> {
        let extracted = PdfExtractor::extract_file(pdf_path)?;
        let mut report = self
            .build_from_text(&extracted.text, index_path, chunks_path, on_progress)
            .await?;
        report.pages = Some(extracted.pages);
        Ok(report)
    }

    /// Build from already extracted text
    ///
    /// `on_progress` receives (embedded, total) after every batch.
    pub async fn build_from_text(
        &self,
        text: &str,
        index_path: &Path,
        chunks_path: &Path,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<BuildReport> {
        let start = Instant::now();

        let chunks = self.chunker.split(text);
        if chunks.is_empty() {
            return Err(Error::vector_index("No text to index"));
        }
        tracing::info!(
            "Split {} characters into {} chunks (max {} chars)",
            text.chars().count(),
            chunks.len(),
            self.chunker.max_chars()
        );

        let dimensions = self.embedder.dimensions();
        let mut index = FlatL2Index::new(dimensions);

        for batch in chunks.chunks(self.batch_size) {
            let embeddings = self.embedder.embed_batch(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Embedder {} returned {} vectors for {} chunks",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }
            index.add_all(embeddings)?;
            on_progress(index.len(), chunks.len());
        }

        let total = chunks.len();
        let store = ChunkStore::from_texts(chunks);

        index.save(index_path)?;
        store.save(chunks_path)?;

        tracing::info!(
            "Wrote {} vectors to {} and chunk texts to {}",
            index.len(),
            index_path.display(),
            chunks_path.display()
        );

        Ok(BuildReport {
            pages: None,
            characters: text.chars().count(),
            chunks: total,
            dimensions,
            index_path: index_path.to_path_buf(),
            chunks_path: chunks_path.to_path_buf(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{ContextRetriever, Retriever};
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Letter-frequency vectors over a four-letter alphabet
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(['a', 'b', 'c', 'd']
                .iter()
                .map(|letter| text.chars().filter(|c| c == letter).count() as f32)
                .collect())
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "letters"
        }
    }

    #[tokio::test]
    async fn test_build_then_retrieve() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("embeddings").join("faiss_index.bin");
        let chunks_path = dir.path().join("embeddings").join("chunks.json");
        let builder = IndexBuilder::new(Arc::new(LetterEmbedder), SentenceChunker::new(10), 2);

        let mut progress = Vec::new();
        let report = builder
            .build_from_text(
                "aaaa aaaa. bbbb bbbb. cccc cccc. dddd dddd.",
                &index_path,
                &chunks_path,
                |done, total| progress.push((done, total)),
            )
            .await
            .unwrap();

        assert_eq!(report.chunks, 4);
        assert_eq!(report.dimensions, 4);
        assert_eq!(progress, vec![(2, 4), (4, 4)]);

        let retriever = Retriever::load(
            &crate::config::RetrievalConfig {
                enabled: true,
                top_k: 1,
                index_path,
                chunks_path,
            },
            Arc::new(LetterEmbedder),
        )
        .unwrap();

        assert_eq!(retriever.len(), 4);
        assert_eq!(retriever.retrieve("ccc").await.unwrap(), "cccc cccc.");
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let dir = tempdir().unwrap();
        let builder = IndexBuilder::new(Arc::new(LetterEmbedder), SentenceChunker::default(), 8);

        let result = builder
            .build_from_text(
                "  ",
                &dir.path().join("faiss_index.bin"),
                &dir.path().join("chunks.json"),
                |_, _| {},
            )
            .await;

        assert!(result.is_err());
        assert!(!dir.path().join("faiss_index.bin").exists());
    }
}
