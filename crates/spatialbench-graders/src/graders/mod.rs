//! Scoring strategies
//!
//! Every strategy implements [`Grader`]. A grader validates the answer fields
//! it needs, compares them against the ground truth carried in its config and
//! reports a verdict with per-check diagnostics.

mod distribution;
mod label_set;
mod marker_gene;
mod multiple_choice;
mod numeric;
mod spatial;

pub use distribution::DistributionComparisonGrader;
pub use label_set::LabelSetJaccardGrader;
pub use marker_gene::{MarkerGenePrecisionRecallGrader, MarkerGeneSeparationGrader};
pub use multiple_choice::MultipleChoiceGrader;
pub use numeric::NumericToleranceGrader;
pub use spatial::SpatialAdjacencyGrader;

use serde_json::Value;

use crate::transcript::{Message, extract_answer};
use crate::{AgentAnswer, GraderKind, GraderOutcome, GraderResult};

/// Reasoning used when no answer could be recovered from a transcript
pub const NO_ANSWER_REASONING: &str = "Failed to extract answer from conversation history";

/// A scoring strategy
pub trait Grader: Send + Sync {
    /// Strategy implemented by this grader
    fn kind(&self) -> GraderKind;

    /// Grade an already-parsed answer.
    ///
    /// A missing required field yields a failing result. A present field of
    /// the wrong type, or a config that does not fit the grader, is an error.
    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult>;

    /// Grade the answer submitted in a transcript
    fn evaluate(&self, transcript: &[Message], config: &Value) -> GraderOutcome<GraderResult> {
        match extract_answer(transcript) {
            Some(answer) => self.evaluate_answer(&answer, config),
            None => Ok(GraderResult::rejected(NO_ANSWER_REASONING, None)),
        }
    }
}

/// Instantiate the built-in grader for a kind
pub fn grader_for(kind: GraderKind) -> Box<dyn Grader> {
    match kind {
        GraderKind::NumericTolerance => Box::new(NumericToleranceGrader),
        GraderKind::LabelSetJaccard => Box::new(LabelSetJaccardGrader),
        GraderKind::DistributionComparison => Box::new(DistributionComparisonGrader),
        GraderKind::MarkerGenePrecisionRecall => Box::new(MarkerGenePrecisionRecallGrader),
        GraderKind::MarkerGeneSeparation => Box::new(MarkerGeneSeparationGrader),
        GraderKind::SpatialAdjacency => Box::new(SpatialAdjacencyGrader),
        GraderKind::MultipleChoice => Box::new(MultipleChoiceGrader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grader_for_matches_kind() {
        for kind in GraderKind::all() {
            assert_eq!(grader_for(*kind).kind(), *kind);
        }
    }

    #[test]
    fn test_evaluate_without_answer_fails() {
        let grader = MultipleChoiceGrader;
        let transcript = vec![Message::assistant_text("I think it is B")];
        let result = grader
            .evaluate(&transcript, &json!({"correct_answer": "B"}))
            .unwrap();

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.reasoning, NO_ANSWER_REASONING);
        assert!(result.agent_answer.is_none());
    }

    #[test]
    fn test_evaluate_extracts_then_grades() {
        let grader = MultipleChoiceGrader;
        let transcript = vec![Message::submission(
            "<EVAL_ANSWER>{\"answer\": \"b\"}</EVAL_ANSWER>",
        )];
        let result = grader
            .evaluate(&transcript, &json!({"correct_answer": "B"}))
            .unwrap();

        assert!(result.is_pass());
    }
}
