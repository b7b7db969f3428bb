//! Uniform grader result record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AgentAnswer;

/// Flat, key-sorted diagnostics produced by a grader
pub type Metrics = BTreeMap<String, Value>;

/// Outcome of grading one agent answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderResult {
    /// `Some(true|false)` when grading ran, `None` when the answer was not graded
    pub passed: Option<bool>,

    /// Per-field / per-item diagnostics. Only fields that were computed are present.
    #[serde(default)]
    pub metrics: Metrics,

    /// Human-readable check listing
    pub reasoning: String,

    /// The raw answer that was graded
    #[serde(default)]
    pub agent_answer: Option<Value>,
}

impl GraderResult {
    /// Create a graded result
    pub fn graded(
        passed: bool,
        metrics: Metrics,
        reasoning: impl Into<String>,
        answer: &AgentAnswer,
    ) -> Self {
        Self {
            passed: Some(passed),
            metrics,
            reasoning: reasoning.into(),
            agent_answer: Some(Value::Object(answer.clone())),
        }
    }

    /// Failing result for an answer that lacks a required field
    pub fn missing_field(field: &str, answer: &AgentAnswer) -> Self {
        Self::graded(
            false,
            Metrics::new(),
            format!("Agent answer missing required field: {}", field),
            answer,
        )
    }

    /// Failing result with an explanation and no diagnostics
    pub fn rejected(reasoning: impl Into<String>, answer: Option<&AgentAnswer>) -> Self {
        Self {
            passed: Some(false),
            metrics: Metrics::new(),
            reasoning: reasoning.into(),
            agent_answer: answer.map(|a| Value::Object(a.clone())),
        }
    }

    /// Result for an answer that could not be graded at all
    pub fn ungraded(reasoning: impl Into<String>, answer: Option<&AgentAnswer>) -> Self {
        Self {
            passed: None,
            metrics: Metrics::new(),
            reasoning: reasoning.into(),
            agent_answer: answer.map(|a| Value::Object(a.clone())),
        }
    }

    /// Failing result for a grader that broke on the answer's shape
    pub fn grader_error(message: &str, answer: &AgentAnswer) -> Self {
        let mut metrics = Metrics::new();
        metrics.insert("grader_error".to_string(), Value::from(message));
        Self {
            passed: Some(false),
            metrics,
            reasoning: format!(
                "Grader failed due to malformed agent output: {}",
                message
            ),
            agent_answer: Some(Value::Object(answer.clone())),
        }
    }

    /// Whether grading ran and passed
    pub fn is_pass(&self) -> bool {
        self.passed == Some(true)
    }

    /// Numeric metric lookup
    pub fn metric_f64(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(Value::as_f64)
    }

    /// Boolean metric lookup
    pub fn metric_bool(&self, key: &str) -> Option<bool> {
        self.metrics.get(key).and_then(Value::as_bool)
    }
}
