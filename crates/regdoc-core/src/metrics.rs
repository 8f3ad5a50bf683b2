//! Per-query outcome and its persisted projection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ScoredChunk;

/// Everything one query produced.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub retrieved_chunks: Vec<ScoredChunk>,
    /// Wall-clock seconds from start of retrieval to validated answer, 3 dp.
    pub latency_sec: f64,
    pub num_chunks: usize,
    /// Mean reported score, 4 dp; `0.0` with no chunks.
    pub avg_score: f64,
    pub citation_missing: bool,
}

impl QueryOutcome {
    pub fn new(
        answer: String,
        retrieved_chunks: Vec<ScoredChunk>,
        elapsed: Duration,
        citation_missing: bool,
    ) -> Self {
        let num_chunks = retrieved_chunks.len();
        let avg_score = if num_chunks == 0 {
            0.0
        } else {
            let sum: f64 = retrieved_chunks.iter().map(|c| c.score).sum();
            round_to(sum / num_chunks as f64, 4)
        };
        Self {
            answer,
            retrieved_chunks,
            latency_sec: round_to(elapsed.as_secs_f64(), 3),
            num_chunks,
            avg_score,
            citation_missing,
        }
    }
}

/// One line of the metrics log. Retrieved chunks are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub query: String,
    pub latency_sec: f64,
    pub num_chunks: usize,
    pub avg_score: f64,
    pub answer: String,
}

impl MetricsRow {
    pub const HEADER: [&'static str; 5] =
        ["query", "latency_sec", "num_chunks", "avg_score", "answer"];

    pub fn from_outcome(query: &str, outcome: &QueryOutcome) -> Self {
        Self {
            query: query.to_string(),
            latency_sec: outcome.latency_sec,
            num_chunks: outcome.num_chunks,
            avg_score: outcome.avg_score,
            answer: outcome.answer.clone(),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
