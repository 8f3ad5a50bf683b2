//! Okapi BM25 lexical retriever.
//!
//! Built once per query session from the same chunk list that sits in the
//! vector index, so both retrievers always see the same corpus. Each entry
//! keeps its chunk id and metadata, so lexical hits carry exact provenance.
//!
//! Scoring:
//!
//! ```text
//! idf(t)      = ln(1 + (N - df(t) + 0.5) / (df(t) + 0.5))
//! score(q, d) = Σ idf(t) · tf(t,d)·(k1 + 1) / (tf(t,d) + k1·(1 - b + b·|d|/avgdl))
//! ```

use std::collections::HashMap;

use crate::models::{Chunk, ScoredChunk};

/// Term-frequency saturation.
pub const BM25_K1: f64 = 1.5;
/// Length normalization.
pub const BM25_B: f64 = 0.75;

/// Lowercase and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

struct Entry {
    chunk: Chunk,
    term_freqs: HashMap<String, u32>,
    len: usize,
}

/// In-memory BM25 index over a chunk corpus.
pub struct LexicalIndex {
    entries: Vec<Entry>,
    doc_freqs: HashMap<String, usize>,
    avg_len: f64,
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        let mut entries = Vec::with_capacity(chunks.len());
        let mut total_len = 0usize;

        for chunk in chunks {
            let tokens = tokenize(&chunk.content);
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            total_len += tokens.len();
            entries.push(Entry {
                chunk: chunk.clone(),
                term_freqs,
                len: tokens.len(),
            });
        }

        let avg_len = if entries.is_empty() {
            0.0
        } else {
            total_len as f64 / entries.len() as f64
        };

        Self {
            entries,
            doc_freqs,
            avg_len,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn idf(&self, term: &str) -> f64 {
        let df = self.doc_freqs.get(term).copied().unwrap_or(0);
        if df == 0 {
            return 0.0;
        }
        let n = self.entries.len() as f64;
        let df = df as f64;
        (1.0 + ((n - df + 0.5) / (df + 0.5)).max(0.0)).ln()
    }

    fn score(&self, entry: &Entry, query_terms: &[(String, f64)]) -> f64 {
        let norm = 1.0 - BM25_B + BM25_B * entry.len as f64 / self.avg_len;
        query_terms
            .iter()
            .map(|(term, idf)| {
                let tf = f64::from(entry.term_freqs.get(term).copied().unwrap_or(0));
                if tf == 0.0 {
                    0.0
                } else {
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm)
                }
            })
            .sum()
    }

    /// Top-`k` chunks by BM25 score. Only positive scores are returned;
    /// equal scores keep corpus order.
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        if k == 0 || self.entries.is_empty() || self.avg_len <= 0.0 {
            return Vec::new();
        }
        let query_terms: Vec<(String, f64)> = tokenize(query)
            .into_iter()
            .map(|t| {
                let idf = self.idf(&t);
                (t, idf)
            })
            .collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.score(e, &query_terms)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, s)| ScoredChunk::from_chunk(&self.entries[i].chunk, s))
            .collect()
    }
}
