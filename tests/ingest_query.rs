//! End-to-end tests through the SQLite index: ingest documents, reopen the
//! index, and answer queries with a scripted chat model.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use regdoc::config::Config;
use regdoc::db;
use regdoc::ingest::{ingest_documents, load_documents, IngestReport};
use regdoc::metrics_log::MetricsLog;
use regdoc::migrate;
use regdoc::progress::NoProgress;
use regdoc::query::open_pipeline;
use regdoc::sqlite_index::SqliteIndex;
use regdoc_core::answer::{ChatModel, Prompt, INSUFFICIENT_INFORMATION};
use regdoc_core::chunk::ChunkingParams;
use regdoc_core::embedding::{Embedder, HashEmbedder};
use regdoc_core::metrics::MetricsRow;
use regdoc_core::models::Document;
use regdoc_core::pipeline::RagPipeline;
use regdoc_core::rank::{FusionParams, HybridRanker};
use regdoc_core::store::VectorIndex;
use regdoc_core::CoreError;

struct ScriptedModel {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &Prompt) -> regdoc_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn test_config(tmp: &Path) -> Config {
    let mut config = Config::default();
    config.index.path = tmp.join("regdoc.sqlite");
    config.embedding.provider = "hash".into();
    config
}

async fn open_index(config: &Config, embedder: &dyn Embedder) -> Arc<SqliteIndex> {
    let pool = db::connect(config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    Arc::new(SqliteIndex::new(pool, embedder.model_name()))
}

fn small_chunks() -> ChunkingParams {
    ChunkingParams {
        chunk_size: 1000,
        overlap: 100,
    }
}

fn regulations() -> Vec<Document> {
    vec![
        Document::from_page_texts(
            "A.pdf",
            vec!["CSRD thresholds apply to companies with over 250 employees.".into()],
        ),
        Document::from_page_texts(
            "B.pdf",
            vec!["GEG requires heat pumps in new buildings from 2024.".into()],
        ),
    ]
}

async fn ingest(config: &Config, docs: &[Document]) -> (IngestReport, Arc<SqliteIndex>) {
    let embedder = HashEmbedder::default();
    let index = open_index(config, &embedder).await;
    let report = ingest_documents(docs, &small_chunks(), &embedder, index.as_ref(), 16, &NoProgress)
        .await
        .unwrap();
    (report, index)
}

fn ranker() -> HybridRanker {
    HybridRanker::new(FusionParams::default()).unwrap()
}

#[tokio::test]
async fn test_two_documents_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (report, index) = ingest(&config, &regulations()).await;

    assert_eq!(report.documents, 2);
    assert_eq!(report.pages, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.removed, 0);
    assert_eq!(index.len().await.unwrap(), 2);
    assert_eq!(
        index.stored_model().await.unwrap().as_deref(),
        Some(HashEmbedder::MODEL_NAME)
    );

    let llm = ScriptedModel::new("Companies with over 250 employees [source: A.pdf, page: 0].");
    let pipeline = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm.clone(), ranker())
        .await
        .unwrap();
    let outcome = pipeline.answer("CSRD thresholds").await.unwrap();

    assert_eq!(outcome.num_chunks, 2);
    assert_eq!(outcome.retrieved_chunks[0].metadata.source, "A.pdf");
    assert_eq!(outcome.retrieved_chunks[0].metadata.page, 0);
    assert!(!outcome.citation_missing);
    assert_eq!(llm.calls(), 1);
    assert!(outcome.latency_sec >= 0.0);
}

#[tokio::test]
async fn test_reingest_replaces_previous_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_, index) = ingest(&config, &regulations()).await;
    assert_eq!(index.len().await.unwrap(), 2);

    let only_a = &regulations()[..1];
    let (report, index) = ingest(&config, only_a).await;
    assert_eq!(report.chunks, 1);
    assert_eq!(index.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_replace_keeps_previous_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_, index) = ingest(&config, &regulations()).await;

    // The second insert hits the primary key, after the deletes have run.
    let first = index.chunks().await.unwrap().remove(0);
    let vectors = vec![vec![0.0; HashEmbedder::default().dims()]; 2];
    let result = index.replace(&[first.clone(), first], &vectors).await;
    assert!(result.is_err());

    let sources: Vec<String> = index
        .chunks()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.metadata.source)
        .collect();
    assert_eq!(sources, vec!["A.pdf", "B.pdf"]);
    assert_eq!(index.stored_dims().await.unwrap(), Some(384));
}

#[tokio::test]
async fn test_changed_embedding_dims_rejected_at_open() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    let (_, index) = ingest(&config, &regulations()).await;
    index.check_embedder(&HashEmbedder::default()).await.unwrap();

    config.embedding.dims = Some(64);
    let err = open_pipeline(&config).await.err().unwrap();
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::EmbedderMismatch {
            stored_dims,
            active_dims,
            ..
        }) => {
            assert_eq!(*stored_dims, 384);
            assert_eq!(*active_dims, 64);
        }
        other => panic!("expected an embedder mismatch, got {other:?}"),
    }
    assert!(err.to_string().contains("regdoc ingest"));
}

#[tokio::test]
async fn test_duplicate_pages_are_removed() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let text = "Taxonomy alignment requires substantial contribution.";
    let docs = vec![
        Document::from_page_texts("first.pdf", vec![text.into()]),
        Document::from_page_texts("second.pdf", vec![format!("  {text}\n")]),
    ];
    let (report, index) = ingest(&config, &docs).await;

    assert_eq!(report.chunks_before_dedup, 2);
    assert_eq!(report.removed, 1);
    let chunks = index.chunks().await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.source, "first.pdf");
}

#[tokio::test]
async fn test_empty_corpus_gives_empty_index_and_no_llm_call() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (report, index) = ingest(&config, &[]).await;
    assert_eq!(report, IngestReport::default());
    assert!(index.is_empty().await.unwrap());

    let llm = ScriptedModel::new("unused");
    let result = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm.clone(), ranker()).await;
    assert!(matches!(result, Err(CoreError::EmptyIndex)));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_insufficient_information_passes_guard() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_, index) = ingest(&config, &regulations()).await;

    let llm = ScriptedModel::new(INSUFFICIENT_INFORMATION);
    let pipeline = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm, ranker())
        .await
        .unwrap();
    let outcome = pipeline.answer("What does the Taxonomy say about forestry?").await.unwrap();
    assert_eq!(outcome.answer, INSUFFICIENT_INFORMATION);
    assert!(!outcome.citation_missing);
}

#[tokio::test]
async fn test_outcome_logged_once_per_query() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_, index) = ingest(&config, &regulations()).await;

    let llm = ScriptedModel::new("Heat pumps [source: B.pdf, page: 0].");
    let pipeline = RagPipeline::open(index, Arc::new(HashEmbedder::default()), llm, ranker())
        .await
        .unwrap();
    let log = MetricsLog::new(tmp.path().join("logs").join("metrics.csv"));
    for query in ["GEG heat pumps", "CSRD thresholds"] {
        let outcome = pipeline.answer(query).await.unwrap();
        log.append(&MetricsRow::from_outcome(query, &outcome)).unwrap();
    }

    let rows = log.read_rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].query, "GEG heat pumps");
    assert_eq!(rows[0].num_chunks, 2);
}

#[tokio::test]
async fn test_unreadable_pdfs_are_skipped() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("broken.pdf"), b"not a valid pdf").unwrap();
    std::fs::write(tmp.path().join("readme.txt"), b"ignored").unwrap();

    let docs = load_documents(tmp.path(), &NoProgress).await.unwrap();
    assert!(docs.is_empty());
}
