use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::domain::Domain;
use crate::models::resume::{ResumeRecord, ResumeSummary};

/// Persistence for processed resumes. Written only at upload time.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn find_by_hash(
        &self,
        user_id: Uuid,
        file_hash: &str,
    ) -> Result<Option<ResumeRecord>, AppError>;

    /// Stores `record` unless the user already has a resume with the same hash.
    /// Returns the stored record and whether it was newly created.
    async fn insert_if_absent(&self, record: &ResumeRecord)
        -> Result<(ResumeRecord, bool), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, AppError>;
}

#[derive(Default)]
pub struct MemoryResumeStore {
    resumes: RwLock<HashMap<Uuid, ResumeRecord>>,
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn find_by_hash(
        &self,
        user_id: Uuid,
        file_hash: &str,
    ) -> Result<Option<ResumeRecord>, AppError> {
        let resumes = self.resumes.read().await;
        Ok(resumes
            .values()
            .find(|r| r.user_id == user_id && r.file_hash == file_hash)
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        record: &ResumeRecord,
    ) -> Result<(ResumeRecord, bool), AppError> {
        let mut resumes = self.resumes.write().await;
        if let Some(existing) = resumes
            .values()
            .find(|r| r.user_id == record.user_id && r.file_hash == record.file_hash)
        {
            return Ok((existing.clone(), false));
        }
        resumes.insert(record.id, record.clone());
        Ok((record.clone(), true))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        Ok(self.resumes.read().await.get(&id).cloned())
    }
}

#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    user_id: Uuid,
    file_name: String,
    file_hash: String,
    summary: Json<ResumeSummary>,
    num_chunks: i32,
    matched_domains: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<ResumeRow> for ResumeRecord {
    fn from(row: ResumeRow) -> Self {
        ResumeRecord {
            id: row.id,
            user_id: row.user_id,
            file_name: row.file_name,
            file_hash: row.file_hash,
            summary: row.summary.0,
            num_chunks: row.num_chunks,
            matched_domains: row
                .matched_domains
                .iter()
                .filter_map(|d| Domain::parse(d))
                .collect(),
            created_at: row.created_at,
        }
    }
}

const RESUME_COLUMNS: &str =
    "id, user_id, file_name, file_hash, summary, num_chunks, matched_domains, created_at";

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn find_by_hash(
        &self,
        user_id: Uuid,
        file_hash: &str,
    ) -> Result<Option<ResumeRecord>, AppError> {
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 AND file_hash = $2"
        ))
        .bind(user_id)
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ResumeRecord::from))
    }

    async fn insert_if_absent(
        &self,
        record: &ResumeRecord,
    ) -> Result<(ResumeRecord, bool), AppError> {
        let matched: Vec<String> = record
            .matched_domains
            .iter()
            .map(|d| d.label().to_string())
            .collect();

        let inserted: Option<ResumeRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO resumes
                (id, user_id, file_name, file_hash, summary, num_chunks, matched_domains, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, file_hash) DO NOTHING
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.file_name)
        .bind(&record.file_hash)
        .bind(Json(&record.summary))
        .bind(record.num_chunks)
        .bind(&matched)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.into(), true));
        }

        let existing = self
            .find_by_hash(record.user_id, &record.file_hash)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "Resume insert conflicted but no existing row was found"
                ))
            })?;
        Ok((existing, false))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ResumeRecord>, AppError> {
        let row: Option<ResumeRow> =
            sqlx::query_as(&format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ResumeRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: Uuid, file_hash: &str) -> ResumeRecord {
        ResumeRecord {
            id: Uuid::new_v4(),
            user_id,
            file_name: "cv.txt".into(),
            file_hash: file_hash.into(),
            summary: ResumeSummary::default(),
            num_chunks: 0,
            matched_domains: vec![Domain::Sql],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_dedups_per_user() {
        let store = MemoryResumeStore::default();
        let user = Uuid::new_v4();
        let first = record(user, "abc");

        let (stored, created) = store.insert_if_absent(&first).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let (existing, created) = store.insert_if_absent(&record(user, "abc")).await.unwrap();
        assert!(!created);
        assert_eq!(existing.id, first.id);

        let (_, created) = store
            .insert_if_absent(&record(Uuid::new_v4(), "abc"))
            .await
            .unwrap();
        assert!(created);

        assert_eq!(
            store.find_by_hash(user, "abc").await.unwrap().map(|r| r.id),
            Some(first.id)
        );
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
