use thiserror::Error;

/// Failure reported by a scoring capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// The input has the right columns but values the model cannot take.
    #[error("{0}")]
    Rejected(String),
    /// The model itself failed.
    #[error("{0}")]
    Internal(String),
}

/// A pre-trained classifier: rows of features in, one class label per row out.
///
/// Rows are laid out in `feature_names()` order. Implementations are shared
/// read-only across requests.
pub trait Scorer: Send + Sync {
    fn feature_names(&self) -> &[String];

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<u8>, ScoreError>;
}
