//! # regdoc
//!
//! Grounded question answering over a local collection of regulatory PDFs
//! (CSRD, EU Taxonomy, GEG and similar).
//!
//! PDFs are split into overlapping, page-attributed chunks, deduplicated by
//! content, embedded, and stored in SQLite. A question is answered from the
//! fusion of a BM25 keyword ranking and an embedding-similarity ranking;
//! the answer must cite its sources or say the information is insufficient.
//! Every query's latency and retrieval quality are appended to a CSV log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────┐   ┌──────────┐
//! │  PDFs    │──▶│ Chunk+Dedup+Embed  │──▶│  SQLite   │
//! └──────────┘   └────────────────────┘   └────┬─────┘
//!                                              │
//!                     ┌────────────────────────┘
//!                     ▼
//!             ┌──────────────┐   ┌─────────┐   ┌─────────────┐
//!             │ BM25 + Vector│──▶│   LLM   │──▶│ metrics.csv │
//!             │    fusion    │   │ (cited) │   └─────────────┘
//!             └──────────────┘   └─────────┘
//! ```
//!
//! Retrieval, fusion and the citation guard live in `regdoc-core`; this
//! crate supplies the SQLite index, PDF loading, HTTP providers and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF page extraction |
//! | [`ingest`] | Ingest pipeline |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat model providers |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`query`] | Query, demo, and plot commands |
//! | [`metrics_log`] | CSV metrics log and SVG plot |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod metrics_log;
pub mod migrate;
pub mod progress;
pub mod query;
pub mod sqlite_index;
pub mod stats;
