//! Exhaustive squared-L2 vector index
//!
//! Vectors are addressed by insertion ordinal, which is also the position of the
//! matching text in the chunk store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::error::{Error, Result};

/// Squared Euclidean distance
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Flat (brute force) L2 index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatL2Index {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    /// Create an empty index
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    /// Vector dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a vector, returning its ordinal
    pub fn add(&mut self, vector: Vec<f32>) -> Result<usize> {
        self.check_dimensions(&vector)?;
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Append many vectors
    pub fn add_all(&mut self, vectors: impl IntoIterator<Item = Vec<f32>>) -> Result<()> {
        for vector in vectors {
            self.add(vector)?;
        }
        Ok(())
    }

    /// The `k` nearest ordinals with their squared distances, nearest first
    ///
    /// Returns every entry when the index holds fewer than `k`. Ties keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimensions(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, vector)| (ordinal, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    /// Write the index to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::vector_index(format!("Failed to encode index: {}", e)))?;
        std::fs::write(path, bytes)?;

        tracing::debug!("Saved {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index written by [`FlatL2Index::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::vector_index(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let (index, _): (Self, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
                |e| Error::vector_index(format!("Failed to decode {}: {}", path.display(), e)),
            )?;

        if let Some(bad) = index.vectors.iter().find(|v| v.len() != index.dimensions) {
            return Err(Error::vector_index(format!(
                "Corrupt index {}: vector of {} dimensions in a {}-dimensional index",
                path.display(),
                bad.len(),
                index.dimensions
            )));
        }

        Ok(index)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::vector_index(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}
