use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{ttl_from_secs, SessionId, SessionPayload, SessionStore};
use crate::log_debug;

const ENABLE_LOGS: bool = true;

struct StoredPayload {
    payload: SessionPayload,
    expires_at: DateTime<Utc>,
}

/// Process-local store. Contents are lost on restart.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionId, StoredPayload>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: ttl_from_secs(ttl_secs),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session: &SessionId, payload: SessionPayload) -> Result<()> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let mut guard = self.entries.write().await;

        // Sessions that never come back are only reclaimed here.
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        let dropped = before - guard.len();
        if dropped > 0 {
            log_debug!("Dropped {dropped} expired session payloads");
        }

        guard.insert(
            session.clone(),
            StoredPayload {
                payload,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, session: &SessionId) -> Result<Option<SessionPayload>> {
        let now = Utc::now();
        {
            let guard = self.entries.read().await;
            match guard.get(session) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.payload.clone())),
                Some(_) => {}
            }
        }

        let mut guard = self.entries.write().await;
        // Re-check: a put may have landed between the two locks.
        if let Some(entry) = guard.get(session) {
            if entry.expires_at > now {
                return Ok(Some(entry.payload.clone()));
            }
        }
        guard.remove(session);
        log_debug!("Dropped expired results for session {session}");
        Ok(None)
    }

    async fn clear(&self, session: &SessionId) -> Result<()> {
        self.entries.write().await.remove(session);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        Ok(before - guard.len())
    }
}
