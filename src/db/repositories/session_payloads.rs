use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{from_json, parse_datetime, to_json},
    },
    session::SessionPayload,
};

fn row_to_payload(row: &Row) -> Result<SessionPayload> {
    let columns_json: String = row.get("columns_json")?;
    let records_json: String = row.get("records_json")?;
    let summary_json: String = row.get("summary_json")?;
    let created_at: String = row.get("created_at")?;

    Ok(SessionPayload {
        columns: from_json(&columns_json, "columns_json")?,
        records: from_json(&records_json, "records_json")?,
        summary: from_json(&summary_json, "summary_json")?,
        csv_bytes: row.get("csv_bytes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Insert or replace the payload stored for a session.
    pub async fn upsert_session_payload(
        &self,
        session_id: &str,
        payload: &SessionPayload,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        let columns_json = to_json(&payload.columns, "columns")?;
        let records_json = to_json(&payload.records, "records")?;
        let summary_json = to_json(&payload.summary, "summary")?;
        let csv_bytes = payload.csv_bytes.clone();
        let created_at = payload.created_at.to_rfc3339();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO session_payloads
                    (session_id, columns_json, records_json, summary_json, csv_bytes, created_at, expires_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(session_id) DO UPDATE SET
                    columns_json = excluded.columns_json,
                    records_json = excluded.records_json,
                    summary_json = excluded.summary_json,
                    csv_bytes = excluded.csv_bytes,
                    created_at = excluded.created_at,
                    expires_at_ms = excluded.expires_at_ms",
                params![
                    session_id,
                    columns_json,
                    records_json,
                    summary_json,
                    csv_bytes,
                    created_at,
                    expires_at.timestamp_millis(),
                ],
            )
            .with_context(|| "failed to upsert session payload")?;
            Ok(())
        })
        .await
    }

    /// Payload for a session unless it expired before `now`.
    pub async fn get_session_payload(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionPayload>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT columns_json, records_json, summary_json, csv_bytes, created_at
                 FROM session_payloads
                 WHERE session_id = ?1 AND expires_at_ms > ?2",
            )?;

            let payload = stmt
                .query_row(params![session_id, now.timestamp_millis()], |row| {
                    Ok(row_to_payload(row))
                })
                .optional()?
                .transpose()?;

            Ok(payload)
        })
        .await
    }

    pub async fn delete_session_payload(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM session_payloads WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(deleted)
        })
        .await
    }

    pub async fn purge_expired_session_payloads(&self, now: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM session_payloads WHERE expires_at_ms <= ?1",
                params![now.timestamp_millis()],
            )?;
            Ok(deleted)
        })
        .await
    }
}
