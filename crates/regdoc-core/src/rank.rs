//! Hybrid ranking: weighted fusion of lexical and semantic result lists.
//!
//! The ranker is pure. The caller runs both retrievers with their own `k`
//! and hands the two [`ScoredChunk`] lists to [`HybridRanker::fuse`].
//!
//! # Fusion Algorithm
//!
//! 1. Turn each list into per-chunk rank scores (higher is better):
//!    * [`FusionMethod::Rrf`]: `1 / (c + rank)`, rank 1-based;
//!    * [`FusionMethod::MinMax`]: min-max normalized raw scores, with
//!      semantic distances inverted.
//! 2. Merge by content key. A chunk in both lists gets both contributions:
//!    `fused = w_lex × L + w_sem × S`, absent side contributing `0`.
//! 3. Sort by fused score (desc); ties keep first-seen order, lexical first.
//!
//! The reported score of a context chunk is recovered separately by
//! [`align_report_scores`], matching on chunk id.

use std::collections::HashMap;

use serde::Serialize;

use crate::dedup::content_key;
use crate::error::{CoreError, Result};
use crate::models::ScoredChunk;

/// How a retriever's ranked list becomes rank scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionMethod {
    /// Reciprocal rank fusion with constant `k`.
    Rrf { k: f64 },
    /// Min-max normalization of raw scores.
    MinMax,
}

impl Default for FusionMethod {
    fn default() -> Self {
        FusionMethod::Rrf { k: 60.0 }
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct FusionParams {
    pub lexical_weight: f64,
    pub semantic_weight: f64,
    /// Number of lexical candidates to fetch.
    pub lexical_k: usize,
    /// Number of semantic candidates to fetch.
    pub semantic_k: usize,
    pub method: FusionMethod,
    /// Lower bound on the semantic search used to report scores.
    pub report_k_min: usize,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            lexical_weight: 0.3,
            semantic_weight: 0.7,
            lexical_k: 4,
            semantic_k: 4,
            method: FusionMethod::default(),
            report_k_min: 8,
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<()> {
        if self.lexical_weight < 0.0 || self.semantic_weight < 0.0 {
            return Err(CoreError::InvalidFusion(
                "weights must be non-negative".to_string(),
            ));
        }
        let sum = self.lexical_weight + self.semantic_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::InvalidFusion(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        if self.lexical_k == 0 || self.semantic_k == 0 {
            return Err(CoreError::InvalidFusion("k must be at least 1".to_string()));
        }
        if let FusionMethod::Rrf { k } = self.method {
            if k.is_nan() || k < 0.0 {
                return Err(CoreError::InvalidFusion(format!(
                    "rrf constant must be non-negative, got {k}"
                )));
            }
        }
        Ok(())
    }
}

/// One entry of the fused context, with its scoring breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct FusedChunk {
    pub chunk: ScoredChunk,
    /// 1-based position in the lexical list, if present there.
    pub lexical_rank: Option<usize>,
    /// 1-based position in the semantic list, if present there.
    pub semantic_rank: Option<usize>,
    /// Lexical rank score `L` (0.0 if absent).
    pub lexical_score: f64,
    /// Semantic rank score `S` (0.0 if absent).
    pub semantic_score: f64,
    pub fused_score: f64,
}

#[derive(Debug, Clone)]
pub struct HybridRanker {
    params: FusionParams,
}

impl HybridRanker {
    pub fn new(params: FusionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// `k` for the reporting search over `context_len` fused chunks.
    pub fn report_k(&self, context_len: usize) -> usize {
        context_len.max(self.params.report_k_min)
    }

    /// Fuse lexical (higher is better) and semantic (distance, lower is
    /// better) lists into one context, best first.
    pub fn fuse(&self, lexical: &[ScoredChunk], semantic: &[ScoredChunk]) -> Vec<FusedChunk> {
        match (lexical.is_empty(), semantic.is_empty()) {
            (true, true) => {
                tracing::warn!("both retrievers returned no candidates");
                return Vec::new();
            }
            (true, false) => tracing::warn!("lexical retriever returned no candidates"),
            (false, true) => tracing::warn!("semantic retriever returned no candidates"),
            (false, false) => {}
        }

        let lex_scores = self.rank_scores(lexical, false);
        let sem_scores = self.rank_scores(semantic, true);

        let mut order: Vec<String> = Vec::new();
        let mut fused: HashMap<String, FusedChunk> = HashMap::new();

        for (i, (c, s)) in lexical.iter().zip(lex_scores).enumerate() {
            let key = content_key(&c.content);
            let entry = fused.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                empty_fused(c)
            });
            if entry.lexical_rank.is_none() {
                entry.lexical_rank = Some(i + 1);
                entry.lexical_score = s;
            }
        }
        for (i, (c, s)) in semantic.iter().zip(sem_scores).enumerate() {
            let key = content_key(&c.content);
            let entry = fused.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                empty_fused(c)
            });
            if entry.semantic_rank.is_none() {
                entry.semantic_rank = Some(i + 1);
                entry.semantic_score = s;
            }
        }

        let mut results: Vec<FusedChunk> = order
            .iter()
            .filter_map(|key| fused.remove(key))
            .map(|mut f| {
                f.fused_score = self.params.lexical_weight * f.lexical_score
                    + self.params.semantic_weight * f.semantic_score;
                f.chunk.score = f.fused_score;
                f
            })
            .collect();

        // Stable sort keeps first-seen order among equal scores.
        results.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    fn rank_scores(&self, list: &[ScoredChunk], is_distance: bool) -> Vec<f64> {
        match self.params.method {
            FusionMethod::Rrf { k } => (1..=list.len()).map(|rank| 1.0 / (k + rank as f64)).collect(),
            FusionMethod::MinMax => {
                let raw: Vec<f64> = list.iter().map(|c| c.score).collect();
                let norm = normalize_scores(&raw);
                if is_distance {
                    // All-equal lists normalize to 1.0 and stay there.
                    let all_equal = norm.iter().all(|s| (*s - 1.0).abs() < f64::EPSILON);
                    if all_equal {
                        return norm;
                    }
                    norm.into_iter().map(|s| 1.0 - s).collect()
                } else {
                    norm
                }
            }
        }
    }
}

fn empty_fused(c: &ScoredChunk) -> FusedChunk {
    FusedChunk {
        chunk: c.clone(),
        lexical_rank: None,
        semantic_rank: None,
        lexical_score: 0.0,
        semantic_score: 0.0,
        fused_score: 0.0,
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    scores
        .iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

/// Build the reported `(content, metadata, score)` list for a fused context.
///
/// Each context chunk is looked up by id in `report`, the result of a
/// semantic search with [`HybridRanker::report_k`] neighbours. The score is
/// that chunk's semantic distance, or `0.0` when it is not among them.
/// Content and metadata always come from the context chunk itself.
pub fn align_report_scores(context: &[FusedChunk], report: &[ScoredChunk]) -> Vec<ScoredChunk> {
    let distances: HashMap<&str, f64> = report
        .iter()
        .map(|r| (r.chunk_id.as_str(), r.score))
        .collect();
    context
        .iter()
        .map(|f| {
            let score = distances
                .get(f.chunk.chunk_id.as_str())
                .copied()
                .unwrap_or(0.0);
            ScoredChunk {
                score,
                ..f.chunk.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn sc(id: &str, content: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata::new(&format!("{id}.pdf"), 0),
            score,
        }
    }

    fn ranker(method: FusionMethod) -> HybridRanker {
        HybridRanker::new(FusionParams {
            method,
            ..FusionParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_params_are_valid() {
        let p = FusionParams::default();
        assert!(p.validate().is_ok());
        assert!((p.lexical_weight - 0.3).abs() < 1e-12);
        assert!((p.semantic_weight - 0.7).abs() < 1e-12);
        assert_eq!(p.lexical_k, 4);
        assert_eq!(p.semantic_k, 4);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let p = FusionParams {
            lexical_weight: 0.5,
            semantic_weight: 0.7,
            ..FusionParams::default()
        };
        assert!(matches!(p.validate(), Err(CoreError::InvalidFusion(_))));
        let p = FusionParams {
            lexical_weight: -0.1,
            semantic_weight: 1.1,
            ..FusionParams::default()
        };
        assert!(HybridRanker::new(p).is_err());
    }

    #[test]
    fn test_weight_law_rrf() {
        let r = ranker(FusionMethod::Rrf { k: 60.0 });
        let lexical = vec![sc("x", "other", 3.0), sc("a", "shared", 2.0)];
        let semantic = vec![sc("a", "shared", 0.1)];
        let fused = r.fuse(&lexical, &semantic);
        let shared = fused.iter().find(|f| f.chunk.chunk_id == "a").unwrap();
        let l = 1.0 / 62.0;
        let s = 1.0 / 61.0;
        assert!((shared.lexical_score - l).abs() < 1e-12);
        assert!((shared.semantic_score - s).abs() < 1e-12);
        assert!((shared.fused_score - (0.3 * l + 0.7 * s)).abs() < 1e-6);
        assert_eq!(shared.lexical_rank, Some(2));
        assert_eq!(shared.semantic_rank, Some(1));
    }

    #[test]
    fn test_weight_law_minmax() {
        let r = ranker(FusionMethod::MinMax);
        let lexical = vec![sc("a", "shared", 4.0), sc("b", "lex only", 2.0), sc("c", "low", 0.0)];
        let semantic = vec![sc("d", "sem only", 0.2), sc("a", "shared", 0.6), sc("e", "far", 1.0)];
        let fused = r.fuse(&lexical, &semantic);
        let shared = fused.iter().find(|f| f.chunk.chunk_id == "a").unwrap();
        // L = 1.0 (max bm25); S = 1 - (0.6 - 0.2) / 0.8 = 0.5
        assert!((shared.lexical_score - 1.0).abs() < 1e-9);
        assert!((shared.semantic_score - 0.5).abs() < 1e-9);
        assert!((shared.fused_score - (0.3 * 1.0 + 0.7 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_merge_by_content_counts_both_sides() {
        let r = ranker(FusionMethod::default());
        let lexical = vec![sc("a", "CSRD thresholds", 1.2)];
        let semantic = vec![sc("a", "CSRD thresholds", 0.2), sc("b", "GEG heat pumps", 0.9)];
        let fused = r.fuse(&lexical, &semantic);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk.chunk_id, "a");
        assert_eq!(fused[1].chunk.chunk_id, "b");
        assert!(fused[1].lexical_rank.is_none());
        assert_eq!(fused[0].chunk.score, fused[0].fused_score);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let r = HybridRanker::new(FusionParams {
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            ..FusionParams::default()
        })
        .unwrap();
        let fused = r.fuse(&[sc("lex", "one", 1.0)], &[sc("sem", "two", 0.3)]);
        assert_eq!(fused[0].chunk.chunk_id, "lex");
        assert_eq!(fused[1].chunk.chunk_id, "sem");
    }

    #[test]
    fn test_degraded_retrieval() {
        let r = ranker(FusionMethod::default());
        let only_sem = r.fuse(&[], &[sc("a", "alpha", 0.1), sc("b", "beta", 0.2)]);
        assert_eq!(only_sem.len(), 2);
        assert_eq!(only_sem[0].chunk.chunk_id, "a");
        let only_lex = r.fuse(&[sc("a", "alpha", 2.0)], &[]);
        assert_eq!(only_lex.len(), 1);
        assert!(r.fuse(&[], &[]).is_empty());
    }

    #[test]
    fn test_normalize_scores() {
        assert!(normalize_scores(&[]).is_empty());
        assert_eq!(normalize_scores(&[5.0]), vec![1.0]);
        assert_eq!(normalize_scores(&[3.0, 3.0]), vec![1.0, 1.0]);
        let n = normalize_scores(&[10.0, 5.0, 0.0]);
        assert!((n[0] - 1.0).abs() < 1e-9);
        assert!((n[1] - 0.5).abs() < 1e-9);
        assert!(n[2].abs() < 1e-9);
    }

    #[test]
    fn test_report_k_has_floor() {
        let r = ranker(FusionMethod::default());
        assert_eq!(r.report_k(3), 8);
        assert_eq!(r.report_k(11), 11);
    }

    #[test]
    fn test_align_report_scores_by_id() {
        let r = ranker(FusionMethod::default());
        let fused = r.fuse(
            &[sc("lex", "lexical only", 2.0)],
            &[sc("a", "alpha", 0.15), sc("b", "beta", 0.4)],
        );
        let report = vec![sc("b", "beta", 0.4), sc("a", "alpha", 0.15)];
        let aligned = align_report_scores(&fused, &report);
        assert_eq!(aligned.len(), fused.len());
        for (f, a) in fused.iter().zip(&aligned) {
            assert_eq!(f.chunk.chunk_id, a.chunk_id);
            assert_eq!(f.chunk.metadata, a.metadata);
        }
        let score_of = |id: &str| aligned.iter().find(|c| c.chunk_id == id).unwrap().score;
        assert!((score_of("a") - 0.15).abs() < 1e-12);
        assert!((score_of("b") - 0.4).abs() < 1e-12);
        assert_eq!(score_of("lex"), 0.0);
    }
}
