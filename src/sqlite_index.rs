//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Chunks live in `chunks` (insertion order = rowid), vectors in
//! `chunk_vectors` as little-endian f32 BLOBs, and the producing embedding
//! model in `index_meta`. Nearest-neighbour search is brute-force cosine
//! distance over every stored vector, which is plenty for a corpus of a
//! few regulatory documents.

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use regdoc_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use regdoc_core::error::{CoreError, Result};
use regdoc_core::models::{Chunk, ChunkMetadata, ScoredChunk};
use regdoc_core::store::{rank_by_distance, VectorIndex};

/// Key in `index_meta` naming the embedding model.
pub const META_MODEL: &str = "embedding_model";
/// Key in `index_meta` holding vector dimensionality.
pub const META_DIMS: &str = "embedding_dims";

pub struct SqliteIndex {
    pool: SqlitePool,
    model: String,
}

impl SqliteIndex {
    /// Wrap a pool whose schema has been migrated. `model` is recorded
    /// alongside vectors written through this handle.
    pub fn new(pool: SqlitePool, model: &str) -> Self {
        Self {
            pool,
            model: model.to_string(),
        }
    }

    /// Model that produced the stored vectors, if any were stored.
    pub async fn stored_model(&self) -> Result<Option<String>> {
        self.meta(META_MODEL).await
    }

    /// Dimensionality of the stored vectors, if any were stored.
    pub async fn stored_dims(&self) -> Result<Option<usize>> {
        match self.meta(META_DIMS).await? {
            Some(value) => value
                .parse::<usize>()
                .map(Some)
                .map_err(|_| CoreError::Index(format!("corrupt {META_DIMS} value: {value}"))),
            None => Ok(None),
        }
    }

    /// Fail unless `embedder` produces vectors comparable to the stored ones.
    ///
    /// An index without recorded vectors accepts any embedder.
    pub async fn check_embedder(&self, embedder: &dyn Embedder) -> Result<()> {
        let (Some(stored_model), Some(stored_dims)) =
            (self.stored_model().await?, self.stored_dims().await?)
        else {
            return Ok(());
        };
        if stored_model != embedder.model_name() || stored_dims != embedder.dims() {
            return Err(CoreError::EmbedderMismatch {
                stored_model,
                stored_dims,
                active_model: embedder.model_name().to_string(),
                active_dims: embedder.dims(),
            });
        }
        Ok(())
    }

    async fn meta(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Index(e.to_string())
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let source: String = row.get("source");
    let page: i64 = row.get("page");
    let chunk_index: i64 = row.get("chunk_index");
    Chunk {
        id: row.get("id"),
        content: row.get("content"),
        metadata: ChunkMetadata::new(&source, page.max(0) as u32),
        chunk_index: chunk_index.max(0) as u32,
        hash: row.get("hash"),
    }
}

fn check_lengths(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        return Err(CoreError::Index(format!(
            "got {} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    Ok(())
}

async fn delete_all(conn: &mut SqliteConnection) -> Result<()> {
    for stmt in [
        "DELETE FROM chunk_vectors",
        "DELETE FROM chunks",
        "DELETE FROM index_meta",
    ] {
        sqlx::query(stmt)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
    }
    Ok(())
}

async fn insert_all(
    conn: &mut SqliteConnection,
    model: &str,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }

    for (chunk, vector) in chunks.iter().zip(vectors) {
        sqlx::query(
            "INSERT INTO chunks (id, source, page, chunk_index, content, hash) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.metadata.source)
        .bind(i64::from(chunk.metadata.page))
        .bind(i64::from(chunk.chunk_index))
        .bind(&chunk.content)
        .bind(&chunk.hash)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

        sqlx::query("INSERT INTO chunk_vectors (chunk_id, dims, embedding) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
    }

    let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
    for (key, value) in [(META_MODEL, model.to_string()), (META_DIMS, dims.to_string())] {
        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        insert_all(&mut tx, &self.model, chunks, vectors).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        delete_all(&mut tx).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn replace(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        delete_all(&mut tx).await?;
        insert_all(&mut tx, &self.model, chunks, vectors).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn len(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n.max(0) as usize)
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, source, page, chunk_index, content, hash FROM chunks ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.page, c.chunk_index, c.content, c.hash, cv.embedding
            FROM chunks c
            JOIN chunk_vectors cv ON cv.chunk_id = c.id
            ORDER BY c.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let scored = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let blob: Vec<u8> = row.get("embedding");
                let distance = cosine_distance(query_vec, &blob_to_vec(&blob));
                let chunk = row_to_chunk(row);
                (i, distance, ScoredChunk::from_chunk(&chunk, distance))
            })
            .collect();
        Ok(rank_by_distance(scored, k))
    }
}
