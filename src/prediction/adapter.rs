use std::{
    collections::BTreeSet,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use anyhow::{bail, Result};

use super::scorer::{ScoreError, Scorer};
use crate::{
    error::SubmissionError,
    models::{parse_number, FeatureRecord, RecordBatch, StressLevel},
    schema::FEATURE_COLUMNS,
};

/// A batch after scoring: the input columns and numeric rows in their
/// original order, plus one prediction per row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub predictions: Vec<StressLevel>,
}

/// Pass-through around the shared scorer that fixes the feature layout,
/// keeps row order and normalizes failures.
#[derive(Clone)]
pub struct PredictionAdapter {
    scorer: Arc<dyn Scorer>,
}

impl PredictionAdapter {
    /// Wrap a scorer, refusing one whose features are not the expected set.
    pub fn new(scorer: Arc<dyn Scorer>) -> Result<Self> {
        let declared: BTreeSet<&str> = scorer.feature_names().iter().map(String::as_str).collect();
        let expected: BTreeSet<&str> = FEATURE_COLUMNS.iter().copied().collect();
        if declared != expected || scorer.feature_names().len() != FEATURE_COLUMNS.len() {
            let missing: Vec<&str> = expected.difference(&declared).copied().collect();
            let extra: Vec<&str> = declared.difference(&expected).copied().collect();
            bail!(
                "scorer features do not match the expected schema (missing: [{}], extra: [{}])",
                missing.join(", "),
                extra.join(", ")
            );
        }
        Ok(Self { scorer })
    }

    pub fn predict_one(&self, record: &FeatureRecord) -> Result<StressLevel, SubmissionError> {
        let row = self
            .scorer
            .feature_names()
            .iter()
            .map(|name| {
                record.get(name).ok_or_else(|| {
                    SubmissionError::scoring(format!("Model expects unknown feature '{name}'"))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let mut levels = self.run(vec![row])?;
        levels
            .pop()
            .ok_or_else(|| SubmissionError::internal("scorer returned no label for one record"))
    }

    /// Score a batch whose columns already passed schema validation.
    ///
    /// Cells that are not numbers are a scoring rejection naming the row and
    /// column: the columns are right, the values are not.
    pub fn predict_batch(&self, batch: RecordBatch) -> Result<ScoredBatch, SubmissionError> {
        let layout = self
            .scorer
            .feature_names()
            .iter()
            .map(|name| {
                batch.column_index(name).ok_or_else(|| {
                    SubmissionError::scoring(format!("Column '{name}' required by the model is absent"))
                })
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let mut rows = Vec::with_capacity(batch.len());
        for (row_idx, cells) in batch.rows.iter().enumerate() {
            if cells.len() != batch.columns.len() {
                return Err(SubmissionError::input(format!(
                    "Row {} has {} fields, expected {}",
                    row_idx + 1,
                    cells.len(),
                    batch.columns.len()
                )));
            }
            let mut values = Vec::with_capacity(cells.len());
            for (col_idx, cell) in cells.iter().enumerate() {
                let value = parse_number(cell).ok_or_else(|| {
                    SubmissionError::scoring(format!(
                        "Row {}, column '{}': value '{}' is not a number",
                        row_idx + 1,
                        batch.columns[col_idx],
                        cell
                    ))
                })?;
                values.push(value);
            }
            rows.push(values);
        }

        let matrix: Vec<Vec<f64>> = rows
            .iter()
            .map(|values| layout.iter().map(|&idx| values[idx]).collect())
            .collect();
        let predictions = self.run(matrix)?;

        Ok(ScoredBatch {
            columns: batch.columns,
            rows,
            predictions,
        })
    }

    fn run(&self, matrix: Vec<Vec<f64>>) -> Result<Vec<StressLevel>, SubmissionError> {
        let expected = matrix.len();
        let scorer = Arc::clone(&self.scorer);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || scorer.score(&matrix)));

        let labels = match outcome {
            Ok(Ok(labels)) => labels,
            Ok(Err(ScoreError::Rejected(reason))) => {
                return Err(SubmissionError::scoring(format!(
                    "The model rejected the data: {reason}"
                )))
            }
            Ok(Err(ScoreError::Internal(reason))) => {
                return Err(SubmissionError::internal(format!("scorer failed: {reason}")))
            }
            Err(_) => return Err(SubmissionError::internal("scorer panicked")),
        };

        if labels.len() != expected {
            return Err(SubmissionError::internal(format!(
                "scorer returned {} labels for {} records",
                labels.len(),
                expected
            )));
        }

        labels
            .into_iter()
            .map(|label| {
                StressLevel::from_label(label).ok_or_else(|| {
                    SubmissionError::internal(format!("scorer returned unknown label {label}"))
                })
            })
            .collect()
    }
}
