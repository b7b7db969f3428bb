//! Spatial adjacency grader

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{mark, number_field, parse_config, quoted_list, verdict};
use crate::{AgentAnswer, GraderError, GraderKind, GraderOutcome, GraderResult, Metrics};

const MEDIAN_FIELD: &str = "median_ic_to_pc_um";
const P90_FIELD: &str = "p90_ic_to_pc_um";
const WITHIN_15_FIELD: &str = "pct_ic_within_15um";
const MIXED_55_FIELD: &str = "pct_ic_mixed_within_55um";
const SELF_ASSESSMENT_FIELD: &str = "adjacency_pass";

const REQUIRED_FIELDS: [&str; 5] = [
    MEDIAN_FIELD,
    P90_FIELD,
    WITHIN_15_FIELD,
    MIXED_55_FIELD,
    SELF_ASSESSMENT_FIELD,
];

#[derive(Debug, Default, Deserialize)]
struct SpatialConfig {
    #[serde(default)]
    scoring: SpatialScoring,
}

#[derive(Debug, Default, Deserialize)]
struct SpatialScoring {
    #[serde(default)]
    pass_thresholds: SpatialThresholds,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SpatialThresholds {
    max_median_ic_to_pc_um: f64,
    max_p90_ic_to_pc_um: f64,
    min_pct_ic_within_15um: f64,
    min_pct_ic_mixed_within_55um: f64,
}

impl Default for SpatialThresholds {
    fn default() -> Self {
        Self {
            max_median_ic_to_pc_um: 25.0,
            max_p90_ic_to_pc_um: 80.0,
            min_pct_ic_within_15um: 60.0,
            min_pct_ic_mixed_within_55um: 60.0,
        }
    }
}

/// Checks immune-cell to tumor-cell proximity metrics against thresholds.
///
/// Distances must not exceed their maxima, percentages must reach their
/// minima, and the agent's own `adjacency_pass` assessment must be true.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpatialAdjacencyGrader;

impl Grader for SpatialAdjacencyGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::SpatialAdjacency
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: SpatialConfig = parse_config(config)?;
        let t = &config.scoring.pass_thresholds;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !answer.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Ok(GraderResult::rejected(
                format!("Agent answer missing required fields: {}", quoted_list(&missing)),
                Some(answer),
            ));
        }

        let median = number_field(answer, MEDIAN_FIELD)?;
        let p90 = number_field(answer, P90_FIELD)?;
        let within_15 = number_field(answer, WITHIN_15_FIELD)?;
        let mixed_55 = number_field(answer, MIXED_55_FIELD)?;
        let self_assessment = answer
            .get(SELF_ASSESSMENT_FIELD)
            .and_then(Value::as_bool)
            .ok_or_else(|| GraderError::invalid_field(SELF_ASSESSMENT_FIELD, "a boolean"))?;

        let median_pass = median <= t.max_median_ic_to_pc_um;
        let p90_pass = p90 <= t.max_p90_ic_to_pc_um;
        let within_15_pass = within_15 >= t.min_pct_ic_within_15um;
        let mixed_55_pass = mixed_55 >= t.min_pct_ic_mixed_within_55um;
        let passed = median_pass && p90_pass && within_15_pass && mixed_55_pass && self_assessment;

        let mut metrics = Metrics::new();
        metrics.insert(MEDIAN_FIELD.into(), Value::from(median));
        metrics.insert(P90_FIELD.into(), Value::from(p90));
        metrics.insert(WITHIN_15_FIELD.into(), Value::from(within_15));
        metrics.insert(MIXED_55_FIELD.into(), Value::from(mixed_55));
        metrics.insert(SELF_ASSESSMENT_FIELD.into(), Value::Bool(self_assessment));
        metrics.insert("max_median_threshold".into(), Value::from(t.max_median_ic_to_pc_um));
        metrics.insert("max_p90_threshold".into(), Value::from(t.max_p90_ic_to_pc_um));
        metrics.insert("min_pct_15um_threshold".into(), Value::from(t.min_pct_ic_within_15um));
        metrics.insert(
            "min_pct_55um_threshold".into(),
            Value::from(t.min_pct_ic_mixed_within_55um),
        );
        metrics.insert("median_pass".into(), Value::Bool(median_pass));
        metrics.insert("p90_pass".into(), Value::Bool(p90_pass));
        metrics.insert("within_15um_pass".into(), Value::Bool(within_15_pass));
        metrics.insert("mixed_55um_pass".into(), Value::Bool(mixed_55_pass));

        let mut lines = vec![
            format!("Spatial Adjacency Analysis: {}", verdict(passed)),
            String::new(),
            "IC→PC Distance Metrics:".to_string(),
            format!(
                "  {} Median distance: {:.2} µm (threshold: ≤{:.2} µm)",
                mark(median_pass),
                median,
                t.max_median_ic_to_pc_um
            ),
            format!(
                "  {} 90th percentile: {:.2} µm (threshold: ≤{:.2} µm)",
                mark(p90_pass),
                p90,
                t.max_p90_ic_to_pc_um
            ),
            String::new(),
            "IC Proximity to PC:".to_string(),
            format!(
                "  {} IC within 15 µm: {:.1}% (threshold: ≥{:.1}%)",
                mark(within_15_pass),
                within_15,
                t.min_pct_ic_within_15um
            ),
            format!(
                "  {} IC with PC within 55 µm: {:.1}% (threshold: ≥{:.1}%)",
                mark(mixed_55_pass),
                mixed_55,
                t.min_pct_ic_mixed_within_55um
            ),
            String::new(),
            format!(
                "Agent adjacency assessment: {} {}",
                mark(self_assessment),
                self_assessment
            ),
            String::new(),
            format!("Result: {}", verdict(passed)),
        ];

        if !passed {
            let mut reasons = Vec::new();
            if !median_pass {
                reasons.push(format!(
                    "Median {:.2} > {:.2} µm",
                    median, t.max_median_ic_to_pc_um
                ));
            }
            if !p90_pass {
                reasons.push(format!("P90 {:.2} > {:.2} µm", p90, t.max_p90_ic_to_pc_um));
            }
            if !within_15_pass {
                reasons.push(format!(
                    "Within 15 µm {:.1}% < {:.1}%",
                    within_15, t.min_pct_ic_within_15um
                ));
            }
            if !mixed_55_pass {
                reasons.push(format!(
                    "Within 55 µm {:.1}% < {:.1}%",
                    mixed_55, t.min_pct_ic_mixed_within_55um
                ));
            }
            if !self_assessment {
                reasons.push("Agent marked adjacency_pass as false".to_string());
            }
            lines.push(format!("Reasons: {}", reasons.join("; ")));
        }

        Ok(GraderResult::graded(passed, metrics, lines.join("\n"), answer))
    }
}
