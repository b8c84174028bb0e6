//! Retrieval adapter: metadata-filtered top-k similarity search over resume chunks.
//!
//! `VectorIndex` is the capability seam. `MemoryVectorIndex` and `PgVectorIndex` both
//! rank candidates in Rust with `rank_by_similarity`; the Postgres variant only narrows
//! the candidate set by resume and domain in SQL.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::Embedder;
use crate::models::domain::Domain;

pub use memory::MemoryVectorIndex;
pub use postgres::PgVectorIndex;

/// One embedded resume entry with full provenance. Immutable once indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeChunk {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub parent_section: String,
    pub entry_index: i32,
    pub domains: Vec<Domain>,
    pub primary_domain: Option<Domain>,
    pub embedding: Vec<f32>,
}

impl ResumeChunk {
    pub fn matches(&self, filter: &ChunkFilter) -> bool {
        if self.resume_id != filter.resume_id {
            return false;
        }
        match filter.domain {
            Some(domain) => self.primary_domain == Some(domain) || self.domains.contains(&domain),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkFilter {
    pub resume_id: Uuid,
    pub domain: Option<Domain>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkHit {
    pub text: String,
    pub parent_section: String,
    pub entry_index: i32,
    pub domains: Vec<Domain>,
    pub primary_domain: Option<Domain>,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, chunks: &[ResumeChunk]) -> Result<(), AppError>;

    /// Top-`k` chunks matching `filter`, most similar first.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ChunkHit>, AppError>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every candidate against `query` and keeps the best `k`.
/// Ties keep chunk order so results are stable.
pub fn rank_by_similarity<'a>(
    query: &[f32],
    candidates: impl IntoIterator<Item = &'a ResumeChunk>,
    k: usize,
) -> Vec<ChunkHit> {
    let mut scored: Vec<(f32, &ResumeChunk)> = candidates
        .into_iter()
        .map(|chunk| (cosine_similarity(query, &chunk.embedding), chunk))
        .collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.chunk_index.cmp(&b.1.chunk_index))
    });
    scored
        .into_iter()
        .take(k)
        .map(|(score, chunk)| ChunkHit {
            text: chunk.text.clone(),
            parent_section: chunk.parent_section.clone(),
            entry_index: chunk.entry_index,
            domains: chunk.domains.clone(),
            primary_domain: chunk.primary_domain,
            score,
        })
        .collect()
}

/// Embeds `query_text` and fetches the top-`k` chunks for `(resume_id, domain)`,
/// relaxing to the whole resume when the domain has no matching chunk.
pub async fn retrieve_for_domain(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query_text: &str,
    resume_id: Uuid,
    domain: Domain,
    k: usize,
) -> Result<Vec<ChunkHit>, AppError> {
    let embedding = embedder
        .embed(query_text)
        .await
        .map_err(|e| AppError::Llm(format!("Query embedding failed: {e}")))?;

    let hits = index
        .query(
            &embedding,
            k,
            &ChunkFilter {
                resume_id,
                domain: Some(domain),
            },
        )
        .await?;
    if !hits.is_empty() {
        return Ok(hits);
    }

    debug!("No {domain} chunks for resume {resume_id}; relaxing filter to resume only");
    index
        .query(
            &embedding,
            k,
            &ChunkFilter {
                resume_id,
                domain: None,
            },
        )
        .await
}
