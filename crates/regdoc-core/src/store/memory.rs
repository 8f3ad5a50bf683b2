//! In-memory [`VectorIndex`] implementation for tests and one-shot runs.
//!
//! Chunks and vectors live in a `Vec` behind `std::sync::RwLock`.
//! Nearest-neighbour search is brute-force cosine distance.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{CoreError, Result};
use crate::models::{Chunk, ScoredChunk};

use super::{rank_by_distance, VectorIndex};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory index for testing.
pub struct InMemoryIndex {
    entries: RwLock<Vec<StoredChunk>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn stored(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<Vec<StoredChunk>> {
        if chunks.len() != vectors.len() {
            return Err(CoreError::Index(format!(
                "got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            })
            .collect())
    }

    fn poisoned() -> CoreError {
        CoreError::Index("in-memory index lock poisoned".to_string())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let new = Self::stored(chunks, vectors)?;
        self.entries
            .write()
            .map_err(|_| Self::poisoned())?
            .extend(new);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(|_| Self::poisoned())?.clear();
        Ok(())
    }

    async fn replace(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let new = Self::stored(chunks, vectors)?;
        *self.entries.write().map_err(|_| Self::poisoned())? = new;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| Self::poisoned())?.len())
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.iter().map(|e| e.chunk.clone()).collect())
    }

    async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        let scored = entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let distance = cosine_distance(query_vec, &e.vector);
                (i, distance, ScoredChunk::from_chunk(&e.chunk, distance))
            })
            .collect();
        Ok(rank_by_distance(scored, k))
    }
}
