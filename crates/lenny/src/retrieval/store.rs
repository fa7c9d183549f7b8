//! Chunk texts persisted alongside the vector index

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// One stored chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    /// Ordinal shared with the vector index
    pub index: usize,
    /// Chunk text
    pub text: String,
}

/// Ordered chunk texts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<TextChunk>,
}

impl ChunkStore {
    /// Build a store, numbering texts in order
    pub fn from_texts(texts: impl IntoIterator<Item = String>) -> Self {
        Self {
            chunks: texts
                .into_iter()
                .enumerate()
                .map(|(index, text)| TextChunk { index, text })
                .collect(),
        }
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Text for an ordinal
    pub fn text(&self, ordinal: usize) -> Option<&str> {
        self.chunks.get(ordinal).map(|chunk| chunk.text.as_str())
    }

    /// All chunks in ordinal order
    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.chunks)?)?;
        Ok(())
    }

    /// Read a store written by [`ChunkStore::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::vector_index(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let chunks: Vec<TextChunk> = serde_json::from_str(&content)?;

        if let Some((position, chunk)) = chunks
            .iter()
            .enumerate()
            .find(|(position, chunk)| chunk.index != *position)
        {
            return Err(Error::vector_index(format!(
                "Chunk at position {} has ordinal {} in {}",
                position,
                chunk.index,
                path.display()
            )));
        }

        Ok(Self { chunks })
    }
}
