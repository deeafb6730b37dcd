//! Per-session storage of batch results between submit and results view.
//!
//! Every lookup has an explicit present/absent answer; callers never rely on
//! ambient state. Stores expire payloads after a time-to-live.

pub mod memory;
pub mod sqlite;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::ResultSummary;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Opaque key chosen by the web layer (usually a cookie value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Results of the last successful batch in one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub columns: Vec<String>,
    pub records: Vec<Map<String, Value>>,
    pub summary: ResultSummary,
    #[serde(skip)]
    pub csv_bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a payload, replacing whatever the session held before.
    async fn put(&self, session: &SessionId, payload: SessionPayload) -> Result<()>;

    /// The session's payload, or `None` when absent or expired.
    async fn get(&self, session: &SessionId) -> Result<Option<SessionPayload>>;

    async fn clear(&self, session: &SessionId) -> Result<()>;

    /// Drop every expired payload. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

/// Default lifetime of a stored payload.
pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

pub(crate) fn ttl_from_secs(secs: u64) -> Duration {
    Duration::seconds(secs.min(i32::MAX as u64) as i64)
}
