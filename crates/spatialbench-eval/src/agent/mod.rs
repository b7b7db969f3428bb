//! Agent adapter contract
//!
//! An adapter runs one agent on a composed prompt inside a workspace and
//! reports what it produced. Expected degraded outcomes (timeout, no answer
//! file, unparsable answer) are encoded in the outcome metadata under
//! `timed_out` and `error_details`; only unexpected failures are errors.

mod command;

pub use command::{CommandAgent, claude_model_alias};

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spatialbench_graders::AgentAnswer;
use thiserror::Error;

use crate::error::EvalError;

/// Errors an adapter may raise
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Agent timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Invocation(String),
}

impl From<AgentError> for EvalError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Timeout { secs } => EvalError::AgentTimeout { secs },
            AgentError::Invocation(message) => EvalError::AgentInvocation(message),
        }
    }
}

/// What an adapter returns: the answer, if any, plus free-form metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub answer: Option<AgentAnswer>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentOutcome {
    /// Outcome carrying an answer
    pub fn answered(answer: AgentAnswer) -> Self {
        Self {
            answer: Some(answer),
            metadata: Map::new(),
        }
    }

    /// Outcome without an answer
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the adapter reported hitting its timeout
    pub fn timed_out(&self) -> bool {
        self.metadata
            .get("timed_out")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Runs an agent against a task
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Adapter name, recorded in result metadata
    fn name(&self) -> &str;

    /// Run the agent on `prompt` with `workspace` as its working directory.
    /// The adapter is expected to stop the agent once `timeout` elapses.
    async fn invoke(
        &self,
        prompt: &str,
        workspace: &Path,
        timeout: Duration,
    ) -> Result<AgentOutcome, AgentError>;
}
