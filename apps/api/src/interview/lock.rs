//! At most one in-flight turn per session.
//!
//! A busy session is rejected immediately rather than waited on. Guards release on drop,
//! so a turn that is cancelled or fails never leaves its session locked; the Redis lock
//! additionally expires after a TTL in case the process dies mid-turn.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// Held for the duration of one turn.
pub struct TurnGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl TurnGuard {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[async_trait]
pub trait TurnLock: Send + Sync {
    /// `None` when another turn for the session holds the lock.
    async fn try_acquire(&self, session_id: Uuid) -> Result<Option<TurnGuard>, AppError>;
}

/// Single-process lock.
#[derive(Default)]
pub struct LocalTurnLock {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

#[async_trait]
impl TurnLock for LocalTurnLock {
    async fn try_acquire(&self, session_id: Uuid) -> Result<Option<TurnGuard>, AppError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(session_id) {
            return Ok(None);
        }
        let set = self.held.clone();
        Ok(Some(TurnGuard::new(move || {
            set.lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&session_id);
        })))
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Cross-process lock: `SET key token NX PX ttl`, released with compare-and-delete so a
/// turn never frees a lock that expired and was taken by someone else.
pub struct RedisTurnLock {
    client: redis::Client,
    ttl: Duration,
}

impl RedisTurnLock {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

fn lock_key(session_id: Uuid) -> String {
    format!("interview:turn-lock:{session_id}")
}

#[async_trait]
impl TurnLock for RedisTurnLock {
    async fn try_acquire(&self, session_id: Uuid) -> Result<Option<TurnGuard>, AppError> {
        let key = lock_key(session_id);
        let token = Uuid::new_v4().to_string();
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        if acquired.is_none() {
            debug!("Turn lock for session {session_id} is held elsewhere");
            return Ok(None);
        }

        Ok(Some(TurnGuard::new(move || {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                warn!("No runtime to release turn lock {key}; it will expire");
                return;
            };
            handle.spawn(async move {
                let released: Result<i32, redis::RedisError> = redis::Script::new(RELEASE_SCRIPT)
                    .key(&key)
                    .arg(&token)
                    .invoke_async(&mut conn)
                    .await;
                if let Err(e) = released {
                    warn!("Failed to release turn lock {key}: {e}");
                }
            });
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_lock_is_exclusive_per_session() {
        let lock = LocalTurnLock::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let guard = lock.try_acquire(a).await.unwrap();
        assert!(guard.is_some());
        assert!(lock.try_acquire(a).await.unwrap().is_none());
        assert!(lock.try_acquire(b).await.unwrap().is_some());

        drop(guard);
        assert!(lock.try_acquire(a).await.unwrap().is_some());
    }

    #[test]
    fn test_lock_key_is_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            lock_key(id),
            "interview:turn-lock:00000000-0000-0000-0000-000000000000"
        );
    }
}
