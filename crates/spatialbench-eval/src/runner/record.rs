//! Per-evaluation result record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spatialbench_graders::{AgentAnswer, GraderResult};

use crate::error::{ErrorEntry, EvalError};

/// Outcome of one evaluation, as written to the batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResultRecord {
    #[serde(alias = "test_id")]
    pub eval_id: String,

    /// `Some` only when grading ran
    pub passed: Option<bool>,

    #[serde(default)]
    pub agent_answer: Option<AgentAnswer>,

    #[serde(default)]
    pub grader_result: Option<GraderResult>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EvalResultRecord {
    pub fn new(eval_id: impl Into<String>) -> Self {
        Self {
            eval_id: eval_id.into(),
            passed: None,
            agent_answer: None,
            grader_result: None,
            metadata: Map::new(),
        }
    }

    /// Record for an evaluation that produced nothing but an error
    pub fn from_error(eval_id: impl Into<String>, err: &EvalError, duration_s: f64) -> Self {
        let mut record = Self::new(eval_id);
        record
            .metadata
            .insert("duration_s".into(), Value::from(crate::round2(duration_s)));
        record.push_error(err.to_entry());
        record
    }

    /// Append an entry to `metadata.errors`
    pub fn push_error(&mut self, entry: ErrorEntry) {
        let entry = serde_json::to_value(entry).unwrap_or(Value::Null);
        match self.metadata.get_mut("errors") {
            Some(Value::Array(errors)) => errors.push(entry),
            _ => {
                self.metadata.insert("errors".into(), Value::Array(vec![entry]));
            }
        }
    }

    /// Entries of `metadata.errors`
    pub fn errors(&self) -> Vec<ErrorEntry> {
        self.metadata
            .get("errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any error with `code` was recorded
    pub fn has_error(&self, code: &str) -> bool {
        self.errors().iter().any(|e| e.code == code)
    }

    pub fn duration_s(&self) -> Option<f64> {
        self.metadata.get("duration_s").and_then(Value::as_f64)
    }

    /// Agent-reported cost
    pub fn cost(&self) -> Option<f64> {
        self.metadata.get("total_cost").and_then(Value::as_f64)
    }

    /// Agent-reported steps: `n_steps`, falling back to `n_turns`
    pub fn steps(&self) -> Option<f64> {
        ["n_steps", "n_turns"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_record() {
        let err = EvalError::data_staging("latch:///x.h5ad", "403");
        let record = EvalResultRecord::from_error("qc_01", &err, 1.23456);

        assert_eq!(record.passed, None);
        assert_eq!(record.duration_s(), Some(1.23));
        assert!(record.has_error("data_staging"));
        assert_eq!(record.errors().len(), 1);
    }

    #[test]
    fn test_steps_fallback() {
        let mut record = EvalResultRecord::new("a");
        assert_eq!(record.steps(), None);
        record.metadata.insert("n_turns".into(), json!(12));
        assert_eq!(record.steps(), Some(12.0));
        record.metadata.insert("n_steps".into(), json!(5));
        assert_eq!(record.steps(), Some(5.0));
    }

    #[test]
    fn test_accepts_test_id_alias() {
        let record: EvalResultRecord =
            serde_json::from_value(json!({"test_id": "legacy", "passed": true})).unwrap();
        assert_eq!(record.eval_id, "legacy");
        assert_eq!(record.passed, Some(true));
    }
}
