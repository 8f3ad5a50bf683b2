//! Core data models shared by ingestion and query time.
//!
//! A [`Document`] is a loaded PDF: a file name and its [`Page`]s. The
//! chunker turns pages into [`Chunk`]s, which are the unit of indexing and
//! retrieval. Retrievers return [`ScoredChunk`]s; the query pipeline wraps
//! the final selection in a [`QueryOutcome`](crate::metrics::QueryOutcome).

use serde::{Deserialize, Serialize};

/// Fallback source name when a chunk's origin is unknown.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A single page of extracted text. `page` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub source: String,
    pub page: u32,
    pub text: String,
}

/// A loaded source document: its file name plus pages in order.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build a document from per-page texts, numbering pages from 0.
    pub fn from_page_texts(source: &str, texts: Vec<String>) -> Self {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page {
                source: source.to_string(),
                page: i as u32,
                text,
            })
            .collect();
        Self {
            source: source.to_string(),
            pages,
        }
    }
}

/// Provenance attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub page: u32,
}

fn default_source() -> String {
    UNKNOWN_SOURCE.to_string()
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            source: default_source(),
            page: 0,
        }
    }
}

impl ChunkMetadata {
    /// Build metadata, substituting the default for a blank source.
    pub fn new(source: &str, page: u32) -> Self {
        let source = if source.trim().is_empty() {
            default_source()
        } else {
            source.to_string()
        };
        Self { source, page }
    }

    /// The citation tag the answer contract asks the model to emit.
    pub fn citation(&self) -> String {
        format!("[source: {}, page: {}]", self.source, self.page)
    }
}

/// An immutable window of page text.
///
/// - `id`: deterministic UUID derived from source, page and index
/// - `chunk_index`: position within its page, contiguous from 0
/// - `hash`: SHA-256 of the trimmed content, used as the dedup key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub chunk_index: u32,
    pub hash: String,
}

/// One entry of a retrieval result.
///
/// Score meaning depends on who produced it: BM25 weight for the lexical
/// retriever (higher is better), cosine distance for the vector index
/// (lower is better).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
}

impl ScoredChunk {
    pub fn from_chunk(chunk: &Chunk, score: f64) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            score,
        }
    }
}
