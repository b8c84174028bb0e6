use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::domain::Domain;
use crate::retrieval::{rank_by_similarity, ChunkFilter, ChunkHit, ResumeChunk, VectorIndex};

/// Chunks live in `resume_chunks` with their embedding as `REAL[]`. SQL narrows by resume
/// and domain; similarity is computed in Rust since a resume holds tens of chunks at most.
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResumeChunkRow {
    id: Uuid,
    resume_id: Uuid,
    chunk_index: i32,
    text: String,
    parent_section: String,
    entry_index: i32,
    domains: Vec<String>,
    primary_domain: Option<String>,
    embedding: Vec<f32>,
}

impl From<ResumeChunkRow> for ResumeChunk {
    fn from(row: ResumeChunkRow) -> Self {
        ResumeChunk {
            id: row.id,
            resume_id: row.resume_id,
            chunk_index: row.chunk_index,
            text: row.text,
            parent_section: row.parent_section,
            entry_index: row.entry_index,
            domains: row.domains.iter().filter_map(|d| Domain::parse(d)).collect(),
            primary_domain: row.primary_domain.as_deref().and_then(Domain::parse),
            embedding: row.embedding,
        }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(&self, chunks: &[ResumeChunk]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            let domains: Vec<String> = chunk.domains.iter().map(|d| d.label().to_string()).collect();
            sqlx::query(
                r#"
                INSERT INTO resume_chunks
                    (id, resume_id, chunk_index, text, parent_section, entry_index,
                     domains, primary_domain, embedding)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET
                    text = EXCLUDED.text,
                    domains = EXCLUDED.domains,
                    primary_domain = EXCLUDED.primary_domain,
                    embedding = EXCLUDED.embedding
                "#,
            )
            .bind(chunk.id)
            .bind(chunk.resume_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.parent_section)
            .bind(chunk.entry_index)
            .bind(&domains)
            .bind(chunk.primary_domain.map(|d| d.label()))
            .bind(&chunk.embedding)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ChunkHit>, AppError> {
        let rows: Vec<ResumeChunkRow> = sqlx::query_as(
            r#"
            SELECT id, resume_id, chunk_index, text, parent_section, entry_index,
                   domains, primary_domain, embedding
            FROM resume_chunks
            WHERE resume_id = $1
              AND ($2::TEXT IS NULL OR primary_domain = $2 OR $2 = ANY(domains))
            ORDER BY chunk_index
            "#,
        )
        .bind(filter.resume_id)
        .bind(filter.domain.map(|d| d.label()))
        .fetch_all(&self.pool)
        .await?;

        let chunks: Vec<ResumeChunk> = rows.into_iter().map(ResumeChunk::from).collect();
        Ok(rank_by_similarity(embedding, &chunks, k))
    }
}
