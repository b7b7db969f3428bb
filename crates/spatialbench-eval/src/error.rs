//! Error taxonomy for the evaluation harness
//!
//! Only [`EvalError::InvalidTaskSpec`], [`EvalError::DataStaging`] and
//! [`EvalError::Workspace`] abort an evaluation. Every other variant is
//! recorded in the result metadata and the run continues to cleanup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for harness operations
pub type HarnessResult<T> = Result<T, EvalError>;

/// Errors raised while running an evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Task spec could not be read, parsed or validated
    #[error("Invalid task spec: {0}")]
    InvalidTaskSpec(String),

    /// A referenced dataset could not be retrieved
    #[error("Failed to stage dataset {uri}: {message}")]
    DataStaging { uri: String, message: String },

    /// The per-evaluation workspace could not be prepared
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// The agent adapter crashed or returned an internal error
    #[error("Agent invocation failed: {0}")]
    AgentInvocation(String),

    /// The agent exceeded its time budget
    #[error("Agent timed out after {secs} seconds")]
    AgentTimeout { secs: u64 },

    /// The answer file exists but is not a JSON object
    #[error("Failed to parse agent answer: {0}")]
    AnswerParse(String),

    /// The configured grader type is not registered
    #[error("Unknown grader type: {0}")]
    UnknownGraderType(String),

    /// The grader failed on the agent's answer
    #[error("Grader failed: {0}")]
    GraderRuntime(String),

    /// A batch worker could not produce a record
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl EvalError {
    /// Create a data staging error
    pub fn data_staging(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataStaging {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Stable error code used in result metadata
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTaskSpec(_) => "invalid_task_spec",
            Self::DataStaging { .. } => "data_staging",
            Self::Workspace(_) => "workspace",
            Self::AgentInvocation(_) => "agent_invocation",
            Self::AgentTimeout { .. } => "agent_timeout",
            Self::AnswerParse(_) => "answer_parse",
            Self::UnknownGraderType(_) => "unknown_grader_type",
            Self::GraderRuntime(_) => "grader_runtime",
            Self::Worker(_) => "worker_failure",
        }
    }

    /// Whether this error aborts the evaluation before the agent runs
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTaskSpec(_) | Self::DataStaging { .. } | Self::Workspace(_) | Self::Worker(_)
        )
    }

    /// Metadata entry describing this error
    pub fn to_entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Error as recorded in `metadata.errors`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
}

impl ErrorEntry {
    /// Create an entry from a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
