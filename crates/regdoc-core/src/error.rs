//! Error type shared by the core components.
//!
//! Fatal conditions ([`CoreError::EmptyIndex`], invalid parameters) are
//! distinct variants. Degraded retrieval is not an error: it is logged and
//! the query proceeds with whatever candidates remain.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid chunking parameters: {0}")]
    InvalidChunking(String),

    #[error("invalid fusion parameters: {0}")]
    InvalidFusion(String),

    #[error("index is empty: no chunks have been ingested. Run `regdoc ingest` to populate it first")]
    EmptyIndex,

    #[error(
        "index was built with {stored_model} ({stored_dims} dims) but the active embedder is \
         {active_model} ({active_dims} dims). Re-run `regdoc ingest` to rebuild it"
    )]
    EmbedderMismatch {
        stored_model: String,
        stored_dims: usize,
        active_model: String,
        active_dims: usize,
    },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector index error: {0}")]
    Index(String),

    #[error("language model call failed: {0}")]
    Llm(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
