//! `regdoc query`, `regdoc demo` and `regdoc plot`.
//!
//! Wires the SQLite index, the configured embedder and chat model into a
//! [`RagPipeline`], prints each outcome, and appends it to the metrics log.

use anyhow::Result;
use std::sync::Arc;

use regdoc_core::metrics::{MetricsRow, QueryOutcome};
use regdoc_core::pipeline::RagPipeline;
use regdoc_core::rank::HybridRanker;
use regdoc_core::store::VectorIndex;
use regdoc_core::CoreError;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_chat_model;
use crate::metrics_log::{render_plot, MetricsLog};
use crate::migrate;
use crate::sqlite_index::SqliteIndex;

/// Built-in queries run by `regdoc demo`.
pub const DEMO_QUERIES: [&str; 3] = [
    "For a medium-sized German construction company, detail the main CSRD reporting thresholds, scopes, and timelines.",
    "Explain EU Taxonomy alignment criteria for sustainable building renovations, including incentives for reducing embodied carbon.",
    "Outline key GEG requirements and compliance risks for heat pump systems in new commercial buildings in Germany.",
];

const PREVIEW_CHARS: usize = 200;

/// Open the persisted index and build the query pipeline.
///
/// An empty index, or one built by a different embedder, is rejected before
/// any chat client is constructed.
pub async fn open_pipeline(config: &Config) -> Result<RagPipeline> {
    let ranker = HybridRanker::new(config.retrieval.fusion_params()?)?;
    let embedder = create_embedder(&config.embedding)?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let index = Arc::new(SqliteIndex::new(pool, embedder.model_name()));
    if index.is_empty().await? {
        return Err(CoreError::EmptyIndex.into());
    }
    index.check_embedder(embedder.as_ref()).await?;

    let llm = create_chat_model(&config.llm)?;
    Ok(RagPipeline::open(index, embedder, llm, ranker).await?)
}

/// Print an outcome the way `query` and `demo` show it.
pub fn print_outcome(query: &str, outcome: &QueryOutcome) {
    println!(
        "Hybrid retrieved {} chunks for query '{}'",
        outcome.num_chunks, query
    );
    println!("Retrieved Chunks:");
    for chunk in &outcome.retrieved_chunks {
        println!(
            "Score: {:.2} | Source: {}, Page: {}\n{}...\n",
            chunk.score,
            chunk.metadata.source,
            chunk.metadata.page,
            preview(&chunk.content)
        );
    }
    println!(
        "Metrics: Latency: {:.2}s, Chunks: {}, Avg Score: {:.2}",
        outcome.latency_sec, outcome.num_chunks, outcome.avg_score
    );
    println!("Answer: {}", outcome.answer);
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

async fn answer_and_log(
    pipeline: &RagPipeline,
    log: Option<&MetricsLog>,
    query: &str,
) -> Result<QueryOutcome> {
    let outcome = pipeline.answer(query).await?;
    if let Some(log) = log {
        log.append(&MetricsRow::from_outcome(query, &outcome))?;
    }
    Ok(outcome)
}

pub async fn run_query(config: &Config, query: &str, log: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let metrics_log = log.then(|| MetricsLog::new(&config.metrics.log_path));
    let outcome = answer_and_log(&pipeline, metrics_log.as_ref(), query).await?;
    print_outcome(query, &outcome);
    Ok(())
}

/// Run [`DEMO_QUERIES`] in order, log each, then regenerate the plot.
pub async fn run_demo(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let metrics_log = MetricsLog::new(&config.metrics.log_path);

    for query in DEMO_QUERIES {
        println!("\nRunning: {}", query);
        let outcome = answer_and_log(&pipeline, Some(&metrics_log), query).await?;
        print_outcome(query, &outcome);
    }

    run_plot(config)
}

pub fn run_plot(config: &Config) -> Result<()> {
    render_plot(&config.metrics.log_path, &config.metrics.plot_path)?;
    Ok(())
}
