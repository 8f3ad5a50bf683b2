//! Index statistics.
//!
//! A quick summary of what is indexed: chunk counts, pages covered per
//! source file, and the embedding model that produced the vectors. Used by
//! `regdoc stats` to confirm an ingest run did what was expected.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_index::{META_DIMS, META_MODEL};

struct SourceStats {
    source: String,
    page_count: i64,
    chunk_count: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;
    let total_vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&pool)
        .await?;

    let model = meta_value(&pool, META_MODEL).await?;
    let dims = meta_value(&pool, META_DIMS).await?;

    let source_stats: Vec<SourceStats> = sqlx::query(
        r#"
        SELECT source,
               COUNT(DISTINCT page) AS page_count,
               COUNT(*) AS chunk_count
        FROM chunks
        GROUP BY source
        ORDER BY source
        "#,
    )
    .fetch_all(&pool)
    .await?
    .iter()
    .map(|row| SourceStats {
        source: row.get("source"),
        page_count: row.get("page_count"),
        chunk_count: row.get("chunk_count"),
    })
    .collect();

    pool.close().await;

    println!("regdoc — Index Stats");
    println!("====================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db::index_size_bytes(config)));
    println!();
    println!("  Chunks:      {}", total_chunks);
    println!("  Vectors:     {}", total_vectors);
    println!(
        "  Model:       {}",
        match (&model, &dims) {
            (Some(m), Some(d)) => format!("{} ({} dims)", m, d),
            (Some(m), None) => m.clone(),
            _ => "none".to_string(),
        }
    );

    if !source_stats.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>6} {:>8}", "SOURCE", "PAGES", "CHUNKS");
        println!("  {}", "-".repeat(56));
        for s in &source_stats {
            println!(
                "  {:<40} {:>6} {:>8}",
                s.source, s.page_count, s.chunk_count
            );
        }
    }

    println!();
    Ok(())
}

async fn meta_value(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    Ok(
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?,
    )
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
