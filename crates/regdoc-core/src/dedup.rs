//! Content-hash deduplication of chunks.
//!
//! Two chunks are duplicates when their trimmed content is byte-identical.
//! The key is a SHA-256 digest, so the result is stable across processes
//! and runs and distinct content is never collapsed in practice.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Result of [`dedup_chunks`]: the surviving chunks and how many were dropped.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub chunks: Vec<Chunk>,
    pub removed: usize,
}

/// SHA-256 hex digest of the trimmed text.
///
/// Only leading and trailing whitespace is stripped; case and inner
/// whitespace are significant.
pub fn content_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drop chunks whose trimmed content was already seen, keeping the first
/// occurrence and the original order.
pub fn dedup_chunks(chunks: Vec<Chunk>) -> DedupOutcome {
    let before = chunks.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let chunks: Vec<Chunk> = chunks
        .into_iter()
        .filter(|c| seen.insert(content_key(&c.content)))
        .collect();
    let removed = before - chunks.len();
    if removed > 0 {
        tracing::debug!(removed, kept = chunks.len(), "removed duplicate chunks");
    }
    DedupOutcome { chunks, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata::new("a.pdf", 0),
            chunk_index: 0,
            hash: content_key(content),
        }
    }

    #[test]
    fn test_key_ignores_surrounding_whitespace() {
        assert_eq!(content_key("  heat pumps \n"), content_key("heat pumps"));
    }

    #[test]
    fn test_key_is_case_and_space_sensitive() {
        assert_ne!(content_key("Heat pumps"), content_key("heat pumps"));
        assert_ne!(content_key("heat  pumps"), content_key("heat pumps"));
    }

    #[test]
    fn test_key_is_stable_hex() {
        assert_eq!(
            content_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_removes_duplicates_keeping_first() {
        let out = dedup_chunks(vec![
            chunk("1", "alpha"),
            chunk("2", "beta"),
            chunk("3", " alpha "),
            chunk("4", "gamma"),
            chunk("5", "beta"),
        ]);
        assert_eq!(out.removed, 2);
        let ids: Vec<&str> = out.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[test]
    fn test_idempotent() {
        let once = dedup_chunks(vec![chunk("1", "a"), chunk("2", "a"), chunk("3", "b")]);
        let twice = dedup_chunks(once.chunks.clone());
        assert_eq!(twice.removed, 0);
        assert_eq!(twice.chunks, once.chunks);
    }

    #[test]
    fn test_empty_input() {
        let out = dedup_chunks(Vec::new());
        assert!(out.chunks.is_empty());
        assert_eq!(out.removed, 0);
    }
}
