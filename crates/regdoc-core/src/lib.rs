//! # regdoc core
//!
//! Retrieval and scoring logic for regdoc: data models, the recursive
//! chunker, content-hash deduplication, the BM25 lexical retriever, the
//! vector index and embedder traits, hybrid rank fusion, the grounded
//! answer contract with its citation guard, and per-query metrics.
//!
//! This crate performs no database, network, or filesystem I/O. Concrete
//! collaborators (SQLite index, embedding providers, chat models) live in
//! the `regdoc` application crate and are passed in as trait objects.
//!
//! ```text
//! build time:  pages ─▶ chunk ─▶ dedup ─▶ embed ─▶ VectorIndex
//! query time:  query ─▶ { LexicalIndex, VectorIndex } ─▶ HybridRanker
//!                    ─▶ ChatModel ─▶ validate_answer ─▶ QueryOutcome
//! ```

pub mod answer;
pub mod chunk;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod lexical;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod rank;
pub mod store;

pub use error::{CoreError, Result};
