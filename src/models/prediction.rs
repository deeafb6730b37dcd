//! Prediction labels and result tallies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

impl StressLevel {
    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            0 => Some(StressLevel::Low),
            1 => Some(StressLevel::Medium),
            2 => Some(StressLevel::High),
            _ => None,
        }
    }

    pub fn label(&self) -> u8 {
        match self {
            StressLevel::Low => 0,
            StressLevel::Medium => 1,
            StressLevel::High => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Low => "low",
            StressLevel::Medium => "medium",
            StressLevel::High => "high",
        }
    }
}

/// Counts per stress level. `total == low + medium + high` by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl ResultSummary {
    pub fn tally(levels: &[StressLevel]) -> Self {
        let mut summary = Self::default();
        for level in levels {
            match level {
                StressLevel::Low => summary.low += 1,
                StressLevel::Medium => summary.medium += 1,
                StressLevel::High => summary.high += 1,
            }
        }
        summary.total = summary.low + summary.medium + summary.high;
        summary
    }
}
