use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::retrieval::{rank_by_similarity, ChunkFilter, ChunkHit, ResumeChunk, VectorIndex};

/// In-process vector index. Backs local runs without a database and the test suite.
#[derive(Default)]
pub struct MemoryVectorIndex {
    chunks: RwLock<Vec<ResumeChunk>>,
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, chunks: &[ResumeChunk]) -> Result<(), AppError> {
        let mut stored = self.chunks.write().await;
        for chunk in chunks {
            match stored.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk.clone(),
                None => stored.push(chunk.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ChunkHit>, AppError> {
        let stored = self.chunks.read().await;
        Ok(rank_by_similarity(
            embedding,
            stored.iter().filter(|c| c.matches(filter)),
            k,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemoryVectorIndex::default();
        let resume_id = Uuid::new_v4();
        let mut chunk = ResumeChunk {
            id: Uuid::new_v4(),
            resume_id,
            chunk_index: 0,
            text: "first".into(),
            parent_section: "skills".into(),
            entry_index: 0,
            domains: vec![],
            primary_domain: None,
            embedding: vec![1.0, 0.0],
        };
        index.upsert(std::slice::from_ref(&chunk)).await.unwrap();
        chunk.text = "second".into();
        index.upsert(&[chunk]).await.unwrap();

        let filter = ChunkFilter {
            resume_id,
            domain: None,
        };
        let hits = index.query(&[1.0, 0.0], 5, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second");
    }
}
