//! Feature records and raw batches.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    error::SubmissionError,
    schema::{feature_index, FEATURE_COLUMNS, FEATURE_COUNT},
};

/// One subject's measurements, stored in canonical feature order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    values: [f64; FEATURE_COUNT],
}

impl FeatureRecord {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Coerce submitted form fields into a record.
    ///
    /// Every expected field must be present and parse as a float. Fields the
    /// form carries beyond the expected set (e.g. `form_type`) are ignored.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, SubmissionError> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(FEATURE_COLUMNS) {
            let raw = fields
                .get(name)
                .ok_or_else(|| SubmissionError::input(format!("Field '{name}' is required")))?;
            *slot = parse_number(raw).ok_or_else(|| {
                SubmissionError::input(format!(
                    "Field '{name}' must be a number, got '{}'",
                    raw.trim()
                ))
            })?;
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|idx| self.values[idx])
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }
}

/// Parse a submitted cell or form value. Blank and non-numeric text yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Uploaded table as read from the file: header plus untyped cells.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}
