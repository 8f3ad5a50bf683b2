//! Recursive, overlap-aware text chunker.
//!
//! Splits page text into [`Chunk`]s no longer than `chunk_size` characters,
//! preferring the coarsest separator that keeps pieces under the limit.
//! Consecutive chunks from the same page share a tail/head window of at
//! most `overlap` characters so that sentences cut at a boundary remain
//! retrievable from either side.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from [`SEPARATORS`] that occurs in the text
//!    (paragraph, line, sentence, word, then single characters).
//! 2. Split on it. Pieces shorter than `chunk_size` are buffered.
//! 3. A piece that is too long flushes the buffer and is split again with
//!    the remaining, finer separators. The empty separator yields single
//!    characters, which acts as the hard cut.
//! 4. Buffered pieces are merged, re-joined with their separator, up to
//!    `chunk_size`. When a window is emitted, leading pieces are dropped
//!    until what is left fits in `overlap`; that tail opens the next window.
//!
//! Lengths are counted in `char`s, so multi-byte text is never cut inside
//! a code point. Blank pages produce no chunks.
//!
//! # Example
//!
//! ```rust
//! use regdoc_core::chunk::{chunk_pages, ChunkingParams};
//! use regdoc_core::models::Page;
//!
//! let pages = vec![Page {
//!     source: "a.pdf".to_string(),
//!     page: 0,
//!     text: "Hello world.\n\nSecond paragraph.".to_string(),
//! }];
//! let params = ChunkingParams { chunk_size: 1000, overlap: 100 };
//! let chunks = chunk_pages(&pages, &params).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].metadata.source, "a.pdf");
//! ```

use std::collections::VecDeque;

use uuid::Uuid;

use crate::dedup::content_key;
use crate::error::{CoreError, Result};
use crate::models::{Chunk, ChunkMetadata, Page};

/// Separators in priority order: paragraph, line, sentence, word, character.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Window size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            overlap: 400,
        }
    }
}

impl ChunkingParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CoreError::InvalidChunking(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(CoreError::InvalidChunking(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Chunk every page, copying `source` and `page` into each chunk.
///
/// Chunk indices restart at 0 for every page. Pages with blank text are
/// skipped.
pub fn chunk_pages(pages: &[Page], params: &ChunkingParams) -> Result<Vec<Chunk>> {
    params.validate()?;

    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            tracing::debug!(source = %page.source, page = page.page, "skipping blank page");
            continue;
        }
        let metadata = ChunkMetadata::new(&page.source, page.page);
        for (i, piece) in split_text(&page.text, params).iter().enumerate() {
            chunks.push(make_chunk(&metadata, i as u32, piece));
        }
    }
    Ok(chunks)
}

/// Split raw text into trimmed, non-empty windows.
pub fn split_text(text: &str, params: &ChunkingParams) -> Vec<String> {
    let splitter = Splitter {
        chunk_size: params.chunk_size,
        overlap: params.overlap,
    };
    splitter.split(text, &SEPARATORS)
}

struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                finer = &[];
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut buffered: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                buffered.push(piece);
                continue;
            }
            if !buffered.is_empty() {
                out.extend(self.merge(&buffered, separator));
                buffered.clear();
            }
            if finer.is_empty() {
                out.extend(self.hard_cut(piece));
            } else {
                out.extend(self.split(piece, finer));
            }
        }
        if !buffered.is_empty() {
            out.extend(self.merge(&buffered, separator));
        }
        out
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(window) = join_trimmed(&current, separator) {
                    windows.push(window);
                }
                // Keep at most `overlap` chars of tail, and make room for `piece`.
                while total > self.overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let had_more = current.len() > 1;
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + if had_more { sep_len } else { 0 };
                    total = total.saturating_sub(dropped);
                }
            }
            current.push_back(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        if let Some(window) = join_trimmed(&current, separator) {
            windows.push(window);
        }
        windows
    }

    fn hard_cut(&self, piece: &str) -> Vec<String> {
        let chars: Vec<char> = piece.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|c| c.iter().collect::<String>())
            .filter_map(|s| {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            })
            .collect()
    }
}

fn join_trimmed(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a [`Chunk`] with a deterministic id and content hash.
fn make_chunk(metadata: &ChunkMetadata, index: u32, text: &str) -> Chunk {
    let name = format!("{}:{}:{}", metadata.source, metadata.page, index);
    Chunk {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
        content: text.to_string(),
        metadata: metadata.clone(),
        chunk_index: index,
        hash: content_key(text),
    }
}
