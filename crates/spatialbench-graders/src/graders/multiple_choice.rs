//! Multiple choice grader

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{parse_config, verdict};
use crate::{AgentAnswer, GraderKind, GraderOutcome, GraderResult, Metrics};

const FIELD: &str = "answer";

#[derive(Debug, Default, Deserialize)]
struct MultipleChoiceConfig {
    #[serde(default)]
    correct_answer: String,
}

/// Trim and uppercase a choice; non-string answers use their JSON text
fn normalize(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.trim().to_uppercase()
}

/// Exact match on a single normalized choice
#[derive(Debug, Default, Clone, Copy)]
pub struct MultipleChoiceGrader;

impl Grader for MultipleChoiceGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::MultipleChoice
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: MultipleChoiceConfig = parse_config(config)?;
        let correct = config.correct_answer.trim().to_uppercase();

        let Some(choice) = answer.get(FIELD) else {
            return Ok(GraderResult::missing_field(FIELD, answer));
        };
        let choice = normalize(choice);
        let passed = choice == correct;

        let mut metrics = Metrics::new();
        metrics.insert("correct_answer".into(), Value::from(correct.as_str()));
        metrics.insert("agent_answer".into(), Value::from(choice.as_str()));

        let mut lines = vec![format!("Multiple Choice: {}", verdict(passed)), String::new()];
        if passed {
            lines.push(format!("✓ Agent answered: {} (correct)", choice));
        } else {
            lines.push(format!("✗ Agent answered: {}", choice));
            lines.push(format!("  Correct answer: {}", correct));
        }

        Ok(GraderResult::graded(passed, metrics, lines.join("\n"), answer))
    }
}
