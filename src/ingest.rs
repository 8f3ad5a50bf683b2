//! Ingestion pipeline orchestration.
//!
//! Coordinates the full ingest flow: PDFs → pages → chunks → dedup →
//! embeddings → index. Each run rebuilds the index from scratch. Vectors
//! are computed before the old index is touched and the swap is a single
//! [`VectorIndex::replace`], so a failed run leaves the previous index intact.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use regdoc_core::chunk::{chunk_pages, ChunkingParams};
use regdoc_core::dedup::dedup_chunks;
use regdoc_core::embedding::Embedder;
use regdoc_core::models::Document;
use regdoc_core::store::VectorIndex;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, embed_in_batches};
use crate::extract::{list_pdfs, load_pdf, ExtractError};
use crate::migrate;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::sqlite_index::SqliteIndex;

/// Counts from one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub pages: usize,
    pub chunks_before_dedup: usize,
    pub removed: usize,
    pub chunks: usize,
}

/// Chunk, dedup, embed and store `docs`, replacing whatever `index` held.
pub async fn ingest_documents(
    docs: &[Document],
    params: &ChunkingParams,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    batch_size: usize,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        documents: docs.len(),
        ..Default::default()
    };

    let mut chunks = Vec::new();
    for doc in docs {
        report.pages += doc.pages.len();
        chunks.extend(chunk_pages(&doc.pages, params)?);
    }
    report.chunks_before_dedup = chunks.len();

    let outcome = dedup_chunks(chunks);
    report.removed = outcome.removed;
    report.chunks = outcome.chunks.len();
    let chunks = outcome.chunks;

    if chunks.is_empty() {
        tracing::warn!("no chunks produced; writing an empty index");
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let total = texts.len() as u64;
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(embed_in_batches(embedder, batch, batch_size).await?);
        progress.report(IngestProgressEvent::Embedding {
            n: vectors.len() as u64,
            total,
        });
    }

    index.replace(&chunks, &vectors).await?;

    tracing::info!(
        documents = report.documents,
        pages = report.pages,
        chunks = report.chunks,
        removed = report.removed,
        model = embedder.model_name(),
        "index rebuilt"
    );
    Ok(report)
}

/// Load every PDF in `dir`. Files that fail to load are logged and skipped.
pub async fn load_documents(
    dir: &Path,
    progress: &dyn IngestProgressReporter,
) -> Result<Vec<Document>> {
    let paths = list_pdfs(dir)
        .with_context(|| format!("Failed to list PDFs in {}", dir.display()))?;
    let total = paths.len() as u64;

    let mut docs = Vec::with_capacity(paths.len());
    for (i, path) in paths.into_iter().enumerate() {
        let file = path.display().to_string();
        progress.report(IngestProgressEvent::Loading {
            file: file.clone(),
            n: i as u64 + 1,
            total,
        });

        let loaded = tokio::task::spawn_blocking(move || load_pdf(&path))
            .await
            .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {e}")));
        match loaded.and_then(|r| r) {
            Ok(doc) => {
                println!("Successfully loaded {} pages from {}", doc.pages.len(), file);
                docs.push(doc);
            }
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "skipping unreadable PDF");
            }
        }
    }
    Ok(docs)
}

/// Run the ingest command.
pub async fn run_ingest(
    config: &Config,
    data_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    progress: ProgressMode,
) -> Result<()> {
    let mut params = config.chunking.params();
    if let Some(size) = chunk_size {
        params.chunk_size = size;
    }
    if let Some(overlap) = overlap {
        params.overlap = overlap;
    }
    params.validate()?;

    let dir = data_dir.unwrap_or_else(|| config.data.dir.clone());
    let reporter = progress.reporter();

    let docs = load_documents(&dir, reporter.as_ref()).await?;
    if docs.is_empty() {
        tracing::warn!(dir = %dir.display(), "no PDFs loaded");
    }

    let embedder = create_embedder(&config.embedding)?;
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let index = SqliteIndex::new(pool.clone(), embedder.model_name());

    let report = ingest_documents(
        &docs,
        &params,
        embedder.as_ref(),
        &index,
        config.embedding.batch_size,
        reporter.as_ref(),
    )
    .await?;
    pool.close().await;

    let size_mb = db::index_size_bytes(config) as f64 / (1024.0 * 1024.0);
    println!(
        "Loaded {} pages total from {} files",
        report.pages, report.documents
    );
    println!("Split into {} chunks", report.chunks_before_dedup);
    println!(
        "Deduplicated to {} unique chunks ({} removed)",
        report.chunks, report.removed
    );
    println!("Index saved to {}", config.index.path.display());
    println!("Index size: {:.2} MB", size_mb);
    Ok(())
}
