//! Turn predictions into caller-ready artifacts.
//!
//! Single records become a `{"prediction": n}` body. Batches become a
//! `SessionPayload`: the augmented table as records, its column list, the
//! summary tally and the CSV bytes offered for download. Packaging only; the
//! caller decides where the payload goes.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    models::{ResultSummary, StressLevel},
    prediction::ScoredBatch,
    schema::PREDICTION_COLUMN,
    session::SessionPayload,
};

pub const DOWNLOAD_FILENAME: &str = "stress_predictions.csv";
pub const DOWNLOAD_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionBody {
    pub prediction: u8,
}

pub fn single(level: StressLevel) -> PredictionBody {
    PredictionBody {
        prediction: level.label(),
    }
}

/// Input columns in their original order with the prediction column last.
pub fn augmented_columns(columns: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(columns.len() + 1);
    out.extend(columns.iter().cloned());
    out.push(PREDICTION_COLUMN.to_string());
    out
}

/// One JSON object per row, keyed by column name.
pub fn to_records(batch: &ScoredBatch) -> Vec<Map<String, Value>> {
    batch
        .rows
        .iter()
        .zip(&batch.predictions)
        .map(|(values, level)| {
            let mut record = Map::with_capacity(values.len() + 1);
            for (column, value) in batch.columns.iter().zip(values) {
                record.insert(column.clone(), Value::from(*value));
            }
            record.insert(PREDICTION_COLUMN.to_string(), Value::from(level.label()));
            record
        })
        .collect()
}

/// UTF-8 CSV with a header row and no index column.
///
/// Floats use the shortest representation that parses back to the same
/// value, so `3.0` is written as `3`.
pub fn to_csv_bytes(batch: &ScoredBatch) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(augmented_columns(&batch.columns))
        .context("failed to write CSV header")?;

    for (row_idx, (values, level)) in batch.rows.iter().zip(&batch.predictions).enumerate() {
        let mut fields: Vec<String> = values.iter().map(|value| value.to_string()).collect();
        fields.push(level.label().to_string());
        writer
            .write_record(&fields)
            .with_context(|| format!("failed to write CSV row {}", row_idx + 1))?;
    }

    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV output: {}", err.error()))
}

/// Package a scored batch for the session store.
pub fn package(batch: &ScoredBatch) -> Result<SessionPayload> {
    let csv_bytes = to_csv_bytes(batch)?;

    Ok(SessionPayload {
        columns: augmented_columns(&batch.columns),
        records: to_records(batch),
        summary: ResultSummary::tally(&batch.predictions),
        csv_bytes,
        created_at: Utc::now(),
    })
}
