//! Embedding index abstraction.
//!
//! The [`VectorIndex`] trait defines what the query pipeline needs from a
//! persisted index: the full chunk corpus (from which the lexical retriever
//! is rebuilt) and nearest-neighbour search over stored vectors. Embedding
//! happens outside the index through [`Embedder`](crate::embedding::Embedder).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, ScoredChunk};

/// Persistent store of chunks and their embedding vectors.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Store chunks with one vector each |
/// | [`clear`](VectorIndex::clear) | Drop every stored chunk |
/// | [`replace`](VectorIndex::replace) | Swap the whole contents in one step |
/// | [`len`](VectorIndex::len) | Number of indexed chunks |
/// | [`chunks`](VectorIndex::chunks) | All chunks, insertion order |
/// | [`nearest`](VectorIndex::nearest) | Cosine-distance k-NN search |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store `chunks[i]` with `vectors[i]`. Lengths must match.
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Replace every stored chunk with `chunks`. On error the previous
    /// contents must survive; the default is only as atomic as `clear` then
    /// `add`, so persistent indexes override it.
    async fn replace(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        self.clear().await?;
        self.add(chunks, vectors).await
    }

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Every indexed chunk in insertion order.
    async fn chunks(&self) -> Result<Vec<Chunk>>;

    /// The `k` chunks closest to `query_vec`, ascending cosine distance,
    /// ties broken by insertion order. Returns `min(k, len)` entries.
    async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Sort `(insertion_order, distance)` pairs the way [`VectorIndex::nearest`]
/// promises and keep the first `k`.
pub fn rank_by_distance<T>(mut scored: Vec<(usize, f64, T)>, k: usize) -> Vec<T> {
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().take(k).map(|(_, _, item)| item).collect()
}
