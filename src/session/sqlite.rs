use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{ttl_from_secs, SessionId, SessionPayload, SessionStore};
use crate::{db::Database, log_debug, log_info};

const ENABLE_LOGS: bool = true;

/// Store backed by the SQLite session database. Survives restarts, so
/// results stay downloadable until they expire.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Database,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(db: Database, ttl_secs: u64) -> Self {
        Self {
            db,
            ttl: ttl_from_secs(ttl_secs),
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn put(&self, session: &SessionId, payload: SessionPayload) -> Result<()> {
        let expires_at = Utc::now() + self.ttl;
        self.db
            .upsert_session_payload(session.as_str(), &payload, expires_at)
            .await
    }

    async fn get(&self, session: &SessionId) -> Result<Option<SessionPayload>> {
        self.db.get_session_payload(session.as_str(), Utc::now()).await
    }

    async fn clear(&self, session: &SessionId) -> Result<()> {
        let deleted = self.db.delete_session_payload(session.as_str()).await?;
        if deleted > 0 {
            log_debug!("Cleared stored results for session {session}");
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let purged = self.db.purge_expired_session_payloads(Utc::now()).await?;
        if purged > 0 {
            log_info!("Purged {purged} expired session payloads");
        }
        Ok(purged)
    }
}
