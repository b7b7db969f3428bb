//! Grader registry and the grading boundary
//!
//! The registry maps grader kinds to implementations. Grading through the
//! registry never fails: unknown types, grader errors and grader panics are
//! all turned into a [`GradeOutcome`] carrying a result record.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::graders::{Grader, NO_ANSWER_REASONING, grader_for};
use crate::transcript::{Message, extract_answer};
use crate::{AgentAnswer, GraderError, GraderKind, GraderResult, GraderSpec};

/// Result of grading through the registry
#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    /// The grader ran and produced a verdict
    Graded(GraderResult),

    /// No grader is registered for the requested type; the answer is ungraded
    UnknownType {
        grader_type: String,
        result: GraderResult,
    },

    /// The grader raised an error or panicked; recorded as a failing result
    Failed { message: String, result: GraderResult },
}

impl GradeOutcome {
    /// Borrow the result record
    pub fn result(&self) -> &GraderResult {
        match self {
            GradeOutcome::Graded(result) => result,
            GradeOutcome::UnknownType { result, .. } => result,
            GradeOutcome::Failed { result, .. } => result,
        }
    }

    /// Take the result record
    pub fn into_result(self) -> GraderResult {
        match self {
            GradeOutcome::Graded(result) => result,
            GradeOutcome::UnknownType { result, .. } => result,
            GradeOutcome::Failed { result, .. } => result,
        }
    }

    /// Error code for outcomes that should be recorded as errors
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            GradeOutcome::Graded(_) => None,
            GradeOutcome::UnknownType { .. } => Some("unknown_grader_type"),
            GradeOutcome::Failed { .. } => Some("grader_runtime"),
        }
    }

    /// Human-readable error message, if any
    pub fn error_message(&self) -> Option<String> {
        match self {
            GradeOutcome::Graded(_) => None,
            GradeOutcome::UnknownType { grader_type, .. } => {
                Some(GraderError::UnknownType(grader_type.clone()).to_string())
            }
            GradeOutcome::Failed { message, .. } => Some(message.clone()),
        }
    }
}

/// Registry of graders keyed by kind
pub struct GraderRegistry {
    graders: BTreeMap<GraderKind, Box<dyn Grader>>,
}

impl Default for GraderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for GraderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl GraderRegistry {
    /// Registry with no graders
    pub fn empty() -> Self {
        Self {
            graders: BTreeMap::new(),
        }
    }

    /// Registry with every built-in grader
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for kind in GraderKind::all() {
            registry.register(grader_for(*kind));
        }
        registry
    }

    /// Register a grader, replacing any grader of the same kind
    pub fn register(&mut self, grader: Box<dyn Grader>) -> &mut Self {
        self.graders.insert(grader.kind(), grader);
        self
    }

    /// Look up a grader by its type tag
    pub fn get(&self, grader_type: &str) -> Option<&dyn Grader> {
        let kind: GraderKind = grader_type.parse().ok()?;
        self.graders.get(&kind).map(|g| g.as_ref())
    }

    /// Registered kinds in tag order
    pub fn kinds(&self) -> Vec<GraderKind> {
        self.graders.keys().copied().collect()
    }

    /// Whether a type tag resolves to a registered grader
    pub fn supports(&self, grader_type: &str) -> bool {
        self.get(grader_type).is_some()
    }

    /// Grade an already-parsed answer
    pub fn grade_answer(&self, spec: &GraderSpec, answer: &AgentAnswer) -> GradeOutcome {
        let Some(grader) = self.get(&spec.grader_type) else {
            return unknown_type(spec, Some(answer));
        };

        let graded = catch_unwind(AssertUnwindSafe(|| {
            grader.evaluate_answer(answer, &spec.config)
        }));

        match graded {
            Ok(Ok(result)) => GradeOutcome::Graded(result),
            Ok(Err(err)) => {
                tracing::warn!(grader = %spec.grader_type, error = %err, "grader rejected answer shape");
                failed(err.to_string(), answer)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(grader = %spec.grader_type, panic = %message, "grader panicked");
                failed(message, answer)
            }
        }
    }

    /// Extract the submitted answer from a transcript, then grade it
    pub fn grade_transcript(&self, spec: &GraderSpec, transcript: &[Message]) -> GradeOutcome {
        if !self.supports(&spec.grader_type) {
            return unknown_type(spec, None);
        }
        match extract_answer(transcript) {
            Some(answer) => self.grade_answer(spec, &answer),
            None => GradeOutcome::Graded(GraderResult::rejected(NO_ANSWER_REASONING, None)),
        }
    }
}

fn unknown_type(spec: &GraderSpec, answer: Option<&AgentAnswer>) -> GradeOutcome {
    tracing::warn!(grader = %spec.grader_type, "unknown grader type, leaving answer ungraded");
    GradeOutcome::UnknownType {
        grader_type: spec.grader_type.clone(),
        result: GraderResult::ungraded(
            GraderError::UnknownType(spec.grader_type.clone()).to_string(),
            answer,
        ),
    }
}

fn failed(message: String, answer: &AgentAnswer) -> GradeOutcome {
    GradeOutcome::Failed {
        result: GraderResult::grader_error(&message, answer),
        message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "grader panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraderOutcome;
    use serde_json::{Value, json};

    struct PanickingGrader;

    impl Grader for PanickingGrader {
        fn kind(&self) -> GraderKind {
            GraderKind::MultipleChoice
        }

        fn evaluate_answer(&self, _answer: &AgentAnswer, _config: &Value) -> GraderOutcome<GraderResult> {
            panic!("index out of range");
        }
    }

    fn answer(value: Value) -> AgentAnswer {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_has_all_kinds() {
        let registry = GraderRegistry::builtin();
        assert_eq!(registry.kinds(), GraderKind::all().to_vec());
        assert!(registry.supports("spatial_adjacency"));
        assert!(!registry.supports("llm_judge"));
    }

    #[test]
    fn test_empty_registry_reports_unknown_type() {
        let registry = GraderRegistry::empty();
        let spec = GraderSpec::new("multiple_choice", json!({"correct_answer": "A"}));
        let outcome = registry.grade_answer(&spec, &answer(json!({"answer": "A"})));

        assert!(matches!(outcome, GradeOutcome::UnknownType { .. }));
    }

    #[test]
    fn test_unknown_type_is_ungraded() {
        let registry = GraderRegistry::builtin();
        let spec = GraderSpec::new("fuzzy_match", json!({}));
        let outcome = registry.grade_answer(&spec, &answer(json!({"answer": "A"})));

        assert_eq!(outcome.error_code(), Some("unknown_grader_type"));
        assert_eq!(outcome.result().passed, None);
        assert_eq!(outcome.result().reasoning, "Unknown grader type: fuzzy_match");
        assert!(outcome.result().agent_answer.is_some());
    }

    #[test]
    fn test_grader_error_becomes_failing_result() {
        let registry = GraderRegistry::builtin();
        let spec = GraderSpec::new(
            "numeric_tolerance",
            json!({"ground_truth": {"total_cells": 100}}),
        );
        let outcome = registry.grade_answer(&spec, &answer(json!({"total_cells": "lots"})));

        assert_eq!(outcome.error_code(), Some("grader_runtime"));
        let result = outcome.into_result();
        assert_eq!(result.passed, Some(false));
        assert!(result.metrics.contains_key("grader_error"));
        assert!(
            result
                .reasoning
                .starts_with("Grader failed due to malformed agent output:")
        );
    }

    #[test]
    fn test_grader_panic_is_caught() {
        let mut registry = GraderRegistry::empty();
        registry.register(Box::new(PanickingGrader));
        let spec = GraderSpec::new("multiple_choice", json!({}));
        let outcome = registry.grade_answer(&spec, &answer(json!({"answer": "A"})));

        match outcome {
            GradeOutcome::Failed { message, result } => {
                assert_eq!(message, "index out of range");
                assert_eq!(result.passed, Some(false));
                assert_eq!(result.metrics["grader_error"], json!("index out of range"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_becomes_failing_result() {
        let registry = GraderRegistry::builtin();
        let spec = GraderSpec::new("label_set_jaccard", json!({"ground_truth_labels": "T cell"}));
        let outcome = registry.grade_answer(&spec, &answer(json!({"cell_types_predicted": []})));

        assert!(matches!(outcome, GradeOutcome::Failed { .. }));
        assert_eq!(outcome.result().passed, Some(false));
    }

    #[test]
    fn test_grade_transcript_without_submission() {
        let registry = GraderRegistry::builtin();
        let spec = GraderSpec::new("multiple_choice", json!({"correct_answer": "A"}));
        let outcome = registry.grade_transcript(&spec, &[Message::assistant_text("A")]);

        let result = outcome.into_result();
        assert_eq!(result.passed, Some(false));
        assert_eq!(result.reasoning, NO_ANSWER_REASONING);
    }

    #[test]
    fn test_grade_transcript_with_submission() {
        let registry = GraderRegistry::builtin();
        let spec = GraderSpec::new(
            "label_set_jaccard",
            json!({"ground_truth_labels": ["T cell", "B cell"]}),
        );
        let transcript = vec![Message::submission(
            "Summary\n<EVAL_ANSWER>{\"cell_types_predicted\": [\"B cell\", \"T cell\"]}</EVAL_ANSWER>",
        )];

        let outcome = registry.grade_transcript(&spec, &transcript);
        assert!(matches!(outcome, GradeOutcome::Graded(_)));
        assert!(outcome.result().is_pass());
    }
}
