//! Request-boundary error type.
//!
//! Every rejected submission resolves to one `SubmissionError`, whose `kind`
//! decides the HTTP status hint and whose message is safe to show the caller.

use serde::Serialize;
use thiserror::Error;

use crate::schema::ColumnMismatch;

/// Message shown to callers for failures that are not their fault.
pub const INTERNAL_MESSAGE: &str = "An unexpected error occurred while processing the data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No file, wrong extension, oversized or unparsable content, bad form values.
    InputShape,
    /// Missing or unexpected columns.
    Schema,
    /// Columns are right but the scorer rejected the values.
    Scoring,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputShape => "input_shape",
            ErrorKind::Schema => "schema",
            ErrorKind::Scoring => "scoring",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InputShape | ErrorKind::Schema => 400,
            ErrorKind::Scoring => 422,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    InputShape(String),
    #[error("{0}")]
    Schema(ColumnMismatch),
    #[error("{0}")]
    Scoring(String),
    /// The string is a diagnostic for logs, never sent to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputShape(message.into())
    }

    pub fn scoring(message: impl Into<String>) -> Self {
        Self::Scoring(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmissionError::InputShape(_) => ErrorKind::InputShape,
            SubmissionError::Schema(_) => ErrorKind::Schema,
            SubmissionError::Scoring(_) => ErrorKind::Scoring,
            SubmissionError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message for the caller. Internal details are replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            SubmissionError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let (missing, extra) = match self {
            SubmissionError::Schema(mismatch) => {
                (Some(mismatch.missing.clone()), Some(mismatch.extra.clone()))
            }
            _ => (None, None),
        };

        ErrorPayload {
            error: true,
            kind: self.kind(),
            message: self.public_message(),
            missing,
            extra,
        }
    }
}

impl From<anyhow::Error> for SubmissionError {
    fn from(err: anyhow::Error) -> Self {
        SubmissionError::Internal(format!("{err:#}"))
    }
}

/// JSON body of a rejected submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error: bool,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<String>>,
}
