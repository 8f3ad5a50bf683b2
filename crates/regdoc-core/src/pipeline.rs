//! Query-time pipeline: retrieve, fuse, answer, measure.
//!
//! Collaborators are passed in explicitly so tests can swap any of them
//! for a fake. The lexical index is built from the vector index's own
//! chunk list at [`RagPipeline::open`], so both retrievers see one corpus.

use std::sync::Arc;
use std::time::Instant;

use crate::answer::{synthesize, ChatModel};
use crate::embedding::{embed_query, Embedder};
use crate::error::{CoreError, Result};
use crate::lexical::LexicalIndex;
use crate::metrics::QueryOutcome;
use crate::models::ScoredChunk;
use crate::rank::{align_report_scores, FusedChunk, HybridRanker};
use crate::store::VectorIndex;

pub struct RagPipeline {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn ChatModel>,
    lexical: LexicalIndex,
    ranker: HybridRanker,
}

/// Fused context plus the scores reported for it.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub context: Vec<FusedChunk>,
    pub reported: Vec<ScoredChunk>,
}

impl RagPipeline {
    /// Load the corpus and build the lexical index.
    ///
    /// Fails with [`CoreError::EmptyIndex`] when nothing has been ingested.
    pub async fn open(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn ChatModel>,
        ranker: HybridRanker,
    ) -> Result<Self> {
        let chunks = index.chunks().await?;
        if chunks.is_empty() {
            return Err(CoreError::EmptyIndex);
        }
        let lexical = LexicalIndex::build(&chunks);
        tracing::info!(chunks = chunks.len(), "query pipeline ready");
        Ok(Self {
            index,
            embedder,
            llm,
            lexical,
            ranker,
        })
    }

    pub fn corpus_len(&self) -> usize {
        self.lexical.len()
    }

    /// Run both retrievers, fuse, and recover reported scores.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let params = self.ranker.params();
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let lexical = self.lexical.search(query, params.lexical_k);
        let semantic = self.index.nearest(&query_vec, params.semantic_k).await?;
        tracing::debug!(
            lexical = lexical.len(),
            semantic = semantic.len(),
            "retrieved candidates"
        );

        let context = self.ranker.fuse(&lexical, &semantic);
        let report = self
            .index
            .nearest(&query_vec, self.ranker.report_k(context.len()))
            .await?;
        let reported = align_report_scores(&context, &report);
        Ok(Retrieval { context, reported })
    }

    /// Answer `query` from the indexed corpus.
    pub async fn answer(&self, query: &str) -> Result<QueryOutcome> {
        let start = Instant::now();
        let Retrieval { context, reported } = self.retrieve(query).await?;
        let validated = synthesize(self.llm.as_ref(), query, &context).await?;
        let outcome = QueryOutcome::new(
            validated.text,
            reported,
            start.elapsed(),
            validated.citation_missing,
        );
        tracing::info!(
            chunks = outcome.num_chunks,
            latency_sec = outcome.latency_sec,
            avg_score = outcome.avg_score,
            "hybrid retrieval answered query"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{Prompt, CITATION_WARNING};
    use crate::chunk::{chunk_pages, ChunkingParams};
    use crate::dedup::dedup_chunks;
    use crate::embedding::HashEmbedder;
    use crate::models::Document;
    use crate::rank::FusionParams;
    use crate::store::memory::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        reply: String,
        calls: AtomicUsize,
    }

    impl CountingModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    async fn indexed(docs: &[(&str, &str)]) -> Arc<InMemoryIndex> {
        let embedder = HashEmbedder::default();
        let params = ChunkingParams {
            chunk_size: 1000,
            overlap: 100,
        };
        let mut chunks = Vec::new();
        for (source, text) in docs {
            let doc = Document::from_page_texts(source, vec![text.to_string()]);
            chunks.extend(chunk_pages(&doc.pages, &params).unwrap());
        }
        let chunks = dedup_chunks(chunks).chunks;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed(&texts).await.unwrap();
        let index = Arc::new(InMemoryIndex::new());
        index.add(&chunks, &vectors).await.unwrap();
        index
    }

    fn ranker() -> HybridRanker {
        HybridRanker::new(FusionParams::default()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_index_rejected_without_model_call() {
        let llm = CountingModel::new("unused");
        let result = RagPipeline::open(
            Arc::new(InMemoryIndex::new()),
            Arc::new(HashEmbedder::default()),
            llm.clone(),
            ranker(),
        )
        .await;
        assert!(matches!(result, Err(CoreError::EmptyIndex)));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_term_match_ranked_first() {
        let index = indexed(&[
            ("A.pdf", "CSRD thresholds apply to companies with over 250 employees."),
            ("B.pdf", "GEG requires heat pumps in new buildings from 2024."),
        ])
        .await;
        let llm = CountingModel::new("Over 250 employees [source: A.pdf, page: 0].");
        let pipeline = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm.clone(), ranker())
            .await
            .unwrap();
        assert_eq!(pipeline.corpus_len(), 2);

        let outcome = pipeline.answer("CSRD thresholds").await.unwrap();
        assert_eq!(outcome.num_chunks, 2);
        assert_eq!(outcome.retrieved_chunks[0].metadata.source, "A.pdf");
        assert_eq!(outcome.retrieved_chunks[1].metadata.source, "B.pdf");
        assert!(!outcome.citation_missing);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        // Reported scores are cosine distances; the A chunk is the closer one.
        assert!(outcome.retrieved_chunks[0].score < outcome.retrieved_chunks[1].score);
    }

    #[tokio::test]
    async fn test_uncited_answer_is_flagged() {
        let index = indexed(&[("A.pdf", "CSRD thresholds apply to large companies.")]).await;
        let llm = CountingModel::new("Large companies.");
        let pipeline = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm, ranker())
            .await
            .unwrap();
        let outcome = pipeline.answer("CSRD").await.unwrap();
        assert!(outcome.citation_missing);
        assert!(outcome.answer.ends_with(CITATION_WARNING));
    }
}
