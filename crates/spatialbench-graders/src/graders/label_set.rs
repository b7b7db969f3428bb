//! Label set Jaccard grader

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{mark, parse_config, string_list, verdict};
use crate::{AgentAnswer, GraderKind, GraderOutcome, GraderResult, Metrics};

const FIELD: &str = "cell_types_predicted";

#[derive(Debug, Default, Deserialize)]
struct LabelSetConfig {
    #[serde(default)]
    ground_truth_labels: Vec<String>,
    #[serde(default)]
    scoring: LabelSetScoring,
}

#[derive(Debug, Deserialize)]
struct LabelSetScoring {
    #[serde(default = "default_pass_threshold")]
    pass_threshold: f64,
}

impl Default for LabelSetScoring {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
        }
    }
}

fn default_pass_threshold() -> f64 {
    0.90
}

/// Jaccard index of two label sets, `0.0` when both are empty
pub fn jaccard_index(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Scores the predicted label set by Jaccard overlap with the ground truth
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelSetJaccardGrader;

impl Grader for LabelSetJaccardGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::LabelSetJaccard
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: LabelSetConfig = parse_config(config)?;
        let threshold = config.scoring.pass_threshold;

        let Some(predicted) = answer.get(FIELD) else {
            return Ok(GraderResult::missing_field(FIELD, answer));
        };
        let predicted: BTreeSet<String> = string_list(predicted, FIELD)?.into_iter().collect();
        let truth: BTreeSet<String> = config.ground_truth_labels.into_iter().collect();

        let jaccard = jaccard_index(&predicted, &truth);
        let passed = jaccard >= threshold;

        let true_positives: Vec<&String> = truth.intersection(&predicted).collect();
        let false_positives: Vec<&String> = predicted.difference(&truth).collect();
        let false_negatives: Vec<&String> = truth.difference(&predicted).collect();

        let mut metrics = Metrics::new();
        metrics.insert("jaccard_index".into(), Value::from(jaccard));
        metrics.insert("pass_threshold".into(), Value::from(threshold));
        metrics.insert("true_positives".into(), serde_json::to_value(&true_positives)?);
        metrics.insert("false_positives".into(), serde_json::to_value(&false_positives)?);
        metrics.insert("false_negatives".into(), serde_json::to_value(&false_negatives)?);
        metrics.insert("predicted_count".into(), Value::from(predicted.len()));
        metrics.insert("ground_truth_count".into(), Value::from(truth.len()));

        let mut lines = vec![
            format!("Label Set Comparison: {}", verdict(passed)),
            String::new(),
            format!(
                "Jaccard Index: {:.3} (threshold: {:.3}) {}",
                jaccard,
                threshold,
                mark(passed)
            ),
            String::new(),
        ];
        label_section(&mut lines, "Correct Labels", "✓", &true_positives);
        lines.push(String::new());
        label_section(&mut lines, "Extra Labels", "+", &false_positives);
        lines.push(String::new());
        label_section(&mut lines, "Missing Labels", "-", &false_negatives);
        lines.push(String::new());
        lines.push(format!("Result: {}", verdict(passed)));

        Ok(GraderResult::graded(passed, metrics, lines.join("\n"), answer))
    }
}

fn label_section(lines: &mut Vec<String>, title: &str, bullet: &str, labels: &[&String]) {
    if labels.is_empty() {
        lines.push(format!("{}: None", title));
        return;
    }
    lines.push(format!("{} ({}):", title, labels.len()));
    lines.extend(labels.iter().map(|label| format!("  {} {}", bullet, label)));
}
