//! Expected feature schema and column-set validation.

use std::{collections::BTreeSet, fmt};

use serde::Serialize;

use crate::error::SubmissionError;

pub const FEATURE_COUNT: usize = 20;

/// The well-being indicators every record must carry, in canonical order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "anxiety_level",
    "self_esteem",
    "mental_health_history",
    "depression",
    "headache",
    "blood_pressure",
    "sleep_quality",
    "breathing_problem",
    "noise_level",
    "living_conditions",
    "safety",
    "basic_needs",
    "academic_performance",
    "study_load",
    "teacher_student_relationship",
    "future_career_concerns",
    "social_support",
    "peer_pressure",
    "extracurricular_activities",
    "bullying",
];

/// Column appended to every scored batch.
pub const PREDICTION_COLUMN: &str = "stress_level_prediction";

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|column| *column == name)
}

/// Columns that differ from the expected set. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMismatch {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing columns: {}", self.missing.join(", ")));
        }
        if !self.extra.is_empty() {
            parts.push(format!("Unexpected columns: {}", self.extra.join(", ")));
        }
        write!(f, "{}", parts.join(". "))
    }
}

/// Compare a column set with the expected features.
///
/// Pure set arithmetic: order and duplicates in `present` do not matter.
pub fn column_mismatch<'a, I>(present: I) -> Option<ColumnMismatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = present.into_iter().collect();
    let expected: BTreeSet<&str> = FEATURE_COLUMNS.iter().copied().collect();

    // BTreeSet differences iterate in sorted order.
    let missing: Vec<String> = expected.difference(&present).map(|s| s.to_string()).collect();
    let extra: Vec<String> = present.difference(&expected).map(|s| s.to_string()).collect();

    if missing.is_empty() && extra.is_empty() {
        None
    } else {
        Some(ColumnMismatch { missing, extra })
    }
}

/// Validate an uploaded header row.
///
/// An empty header or a repeated column name is an input-shape error; any
/// set difference with the expected features is a schema error.
pub fn validate_columns<S: AsRef<str>>(columns: &[S]) -> Result<(), SubmissionError> {
    if columns.is_empty() {
        return Err(SubmissionError::input("The file has no header row"));
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for column in columns {
        let name = column.as_ref();
        if !seen.insert(name) {
            duplicates.insert(name);
        }
    }
    if !duplicates.is_empty() {
        let names: Vec<&str> = duplicates.into_iter().collect();
        return Err(SubmissionError::input(format!(
            "Duplicate columns: {}",
            names.join(", ")
        )));
    }

    match column_mismatch(seen) {
        None => Ok(()),
        Some(mismatch) => Err(SubmissionError::Schema(mismatch)),
    }
}
