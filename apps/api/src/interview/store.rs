use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::InterviewState;
use crate::models::session::{MessageRecord, NewMessage, SessionRecord};

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub record: SessionRecord,
    pub state: InterviewState,
}

/// Session persistence. `InterviewState` is written only as a whole, together with the
/// transcript lines of the turn that produced it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<SessionRecord, AppError>;

    async fn load(&self, id: Uuid) -> Result<Option<StoredSession>, AppError>;

    /// Atomic, all-or-nothing: writes only if the stored version is still
    /// `expected_version` (otherwise `Conflict`) and returns the new version.
    async fn save_turn(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<i64, AppError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError>;

    async fn messages(&self, id: Uuid) -> Result<Vec<MessageRecord>, AppError>;

    /// Removes the session and its transcript. False when it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

fn conflict(id: Uuid, expected: i64, found: i64) -> AppError {
    AppError::Conflict(format!(
        "Session {id} was advanced by another turn (expected version {expected}, found {found})"
    ))
}

fn message_record(session_id: Uuid, message: &NewMessage, at: DateTime<Utc>) -> MessageRecord {
    MessageRecord {
        id: Uuid::new_v4(),
        session_id,
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        created_at: at,
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

struct MemorySession {
    record: SessionRecord,
    /// Kept serialized so loads go through the same round trip as the database.
    state: serde_json::Value,
    messages: Vec<MessageRecord>,
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, MemorySession>>,
}

fn to_document(state: &InterviewState) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(state).map_err(|e| AppError::Internal(e.into()))
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<SessionRecord, AppError> {
        let now = Utc::now();
        let record = SessionRecord {
            id: state.session_id,
            user_id: state.user_id,
            resume_id: state.resume_id,
            job_role: state.job_role.clone(),
            status: state.status.as_str().to_string(),
            current_round: state.current_round.as_str().to_string(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let session = MemorySession {
            record: record.clone(),
            state: to_document(state)?,
            messages: messages
                .iter()
                .map(|m| message_record(record.id, m, now))
                .collect(),
        };
        self.sessions.write().await.insert(record.id, session);
        Ok(record)
    }

    async fn load(&self, id: Uuid) -> Result<Option<StoredSession>, AppError> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(&id) else {
            return Ok(None);
        };
        let state = serde_json::from_value(session.state.clone())
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(Some(StoredSession {
            record: session.record.clone(),
            state,
        }))
    }

    async fn save_turn(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<i64, AppError> {
        let document = to_document(state)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        if session.record.version != expected_version {
            return Err(conflict(id, expected_version, session.record.version));
        }

        let now = Utc::now();
        session.state = document;
        session.record.version += 1;
        session.record.status = state.status.as_str().to_string();
        session.record.current_round = state.current_round.as_str().to_string();
        session.record.updated_at = now;
        session
            .messages
            .extend(messages.iter().map(|m| message_record(id, m, now)));
        Ok(session.record.version)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        let sessions = self.sessions.read().await;
        let mut records: Vec<SessionRecord> = sessions
            .values()
            .filter(|s| s.record.user_id == user_id)
            .map(|s| s.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn messages(&self, id: Uuid) -> Result<Vec<MessageRecord>, AppError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }
}

// ─── PostgreSQL ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SessionStateRow {
    #[sqlx(flatten)]
    record: SessionRecord,
    workflow_state: Json<InterviewState>,
}

const SESSION_COLUMNS: &str =
    "id, user_id, resume_id, job_role, status, current_round, version, created_at, updated_at";

async fn insert_messages(
    tx: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
    messages: &[NewMessage],
) -> Result<(), AppError> {
    let now = Utc::now();
    for message in messages {
        let record = message_record(session_id, message, now);
        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.session_id)
        .bind(&record.role)
        .bind(&record.content)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<SessionRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let record: SessionRecord = sqlx::query_as(&format!(
            r#"
            INSERT INTO interview_sessions
                (id, user_id, resume_id, job_role, status, current_round, version, workflow_state)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(state.session_id)
        .bind(state.user_id)
        .bind(state.resume_id)
        .bind(&state.job_role)
        .bind(state.status.as_str())
        .bind(state.current_round.as_str())
        .bind(Json(state))
        .fetch_one(&mut *tx)
        .await?;
        insert_messages(&mut tx, record.id, messages).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn load(&self, id: Uuid) -> Result<Option<StoredSession>, AppError> {
        let row: Option<SessionStateRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS}, workflow_state FROM interview_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredSession {
            record: r.record,
            state: r.workflow_state.0,
        }))
    }

    async fn save_turn(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &InterviewState,
        messages: &[NewMessage],
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE interview_sessions
            SET workflow_state = $3, status = $4, current_round = $5,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(Json(state))
        .bind(state.status.as_str())
        .bind(state.current_round.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT version FROM interview_sessions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match found {
                Some(found) => conflict(id, expected_version, found),
                None => AppError::NotFound(format!("Session {id} not found")),
            });
        };

        insert_messages(&mut tx, id, messages).await?;
        tx.commit().await?;
        Ok(new_version)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        let rows: Vec<SessionRecord> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn messages(&self, id: Uuid) -> Result<Vec<MessageRecord>, AppError> {
        let rows: Vec<MessageRecord> = sqlx::query_as(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY seq
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM interview_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{Round, SessionStatus};
    use crate::models::resume::ResumeSummary;

    fn state(user_id: Uuid) -> InterviewState {
        InterviewState::new(
            Uuid::new_v4(),
            user_id,
            Uuid::new_v4(),
            "ML Engineer",
            ResumeSummary::default(),
            5,
        )
    }

    #[tokio::test]
    async fn test_create_then_load_round_trips_state() {
        let store = MemorySessionStore::default();
        let s = state(Uuid::new_v4());
        let record = store
            .create(&s, &[NewMessage::assistant("Welcome!")])
            .await
            .unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.status, "active");

        let loaded = store.load(s.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, s);
        assert_eq!(store.messages(s.session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_turn_rejects_stale_version() {
        let store = MemorySessionStore::default();
        let mut s = state(Uuid::new_v4());
        store.create(&s, &[]).await.unwrap();

        s.current_round = Round::Intro;
        let version = store
            .save_turn(s.session_id, 0, &s, &[NewMessage::user("yes")])
            .await
            .unwrap();
        assert_eq!(version, 1);

        s.status = SessionStatus::Completed;
        let stale = store.save_turn(s.session_id, 0, &s, &[NewMessage::user("again")]).await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let loaded = store.load(s.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.record.current_round, "intro");
        assert_eq!(loaded.state.status, SessionStatus::Active);
        assert_eq!(store.messages(s.session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_turn_missing_session() {
        let store = MemorySessionStore::default();
        let s = state(Uuid::new_v4());
        let result = store.save_turn(s.session_id, 0, &s, &[]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = MemorySessionStore::default();
        let user = Uuid::new_v4();
        let a = state(user);
        let b = state(user);
        store.create(&a, &[NewMessage::assistant("hi")]).await.unwrap();
        store.create(&b, &[]).await.unwrap();
        store.create(&state(Uuid::new_v4()), &[]).await.unwrap();

        assert_eq!(store.list_for_user(user).await.unwrap().len(), 2);
        assert!(store.delete(a.session_id).await.unwrap());
        assert!(!store.delete(a.session_id).await.unwrap());
        assert!(store.messages(a.session_id).await.unwrap().is_empty());
        assert_eq!(store.list_for_user(user).await.unwrap().len(), 1);
    }
}
