//! Grader error types

use thiserror::Error;

/// Result type alias for grader operations
pub type GraderOutcome<T> = Result<T, GraderError>;

/// Errors raised while grading an answer.
///
/// A missing required field is not an error: graders report it as a failing
/// [`GraderResult`](crate::GraderResult). These variants cover answers and
/// configs whose shape the grader cannot work with at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraderError {
    /// Grader type string is not registered
    #[error("Unknown grader type: {0}")]
    UnknownType(String),

    /// Grader config does not match the grader's schema
    #[error("Invalid grader config: {0}")]
    InvalidConfig(String),

    /// An answer field is present but has the wrong JSON type
    #[error("Invalid answer field '{field}': expected {expected}")]
    InvalidField { field: String, expected: String },
}

impl GraderError {
    /// Create an invalid-field error
    pub fn invalid_field(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Stable error code used in result metadata
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_grader_type",
            Self::InvalidConfig(_) | Self::InvalidField { .. } => "grader_runtime",
        }
    }
}

impl From<serde_json::Error> for GraderError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
