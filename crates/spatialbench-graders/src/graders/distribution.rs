//! Cell type distribution grader

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{as_number, mark, parse_config, quoted_list, verdict};
use crate::{AgentAnswer, GraderError, GraderKind, GraderOutcome, GraderResult, Metrics};

const TOTAL_FIELD: &str = "total_cells";
const DISTRIBUTION_FIELD: &str = "cell_type_distribution";

#[derive(Debug, Default, Deserialize)]
struct DistributionConfig {
    #[serde(default)]
    ground_truth: GroundTruth,
    #[serde(default)]
    tolerances: DistributionTolerances,
}

#[derive(Debug, Default, Deserialize)]
struct GroundTruth {
    #[serde(default)]
    total_cells: Option<f64>,
    #[serde(default)]
    cell_type_distribution: BTreeMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DistributionTolerances {
    #[serde(default)]
    total_cells: TotalTolerance,
    #[serde(default)]
    cell_type_percentages: PercentTolerance,
}

#[derive(Debug, Default, Deserialize)]
struct TotalTolerance {
    #[serde(default)]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct PercentTolerance {
    #[serde(default = "default_pct_tolerance")]
    value: f64,
}

impl Default for PercentTolerance {
    fn default() -> Self {
        Self {
            value: default_pct_tolerance(),
        }
    }
}

fn default_pct_tolerance() -> f64 {
    3.0
}

/// Compares the total cell count and per-type percentages with ground truth.
///
/// Cell types reported by the agent but absent from the ground truth are
/// listed in the diagnostics without affecting the verdict.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistributionComparisonGrader;

impl Grader for DistributionComparisonGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::DistributionComparison
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: DistributionConfig = parse_config(config)?;
        let pct_tolerance = config.tolerances.cell_type_percentages.value;

        let Some(agent_total) = answer.get(TOTAL_FIELD) else {
            return Ok(GraderResult::missing_field(TOTAL_FIELD, answer));
        };
        let Some(agent_distribution) = answer.get(DISTRIBUTION_FIELD) else {
            return Ok(GraderResult::missing_field(DISTRIBUTION_FIELD, answer));
        };
        let agent_distribution = agent_distribution
            .as_object()
            .ok_or_else(|| GraderError::invalid_field(DISTRIBUTION_FIELD, "an object of percentages"))?;

        let mut metrics = Metrics::new();
        let mut failures = Vec::new();
        let mut all_pass = true;
        let mut lines = Vec::new();

        if let Some(expected_total) = config.ground_truth.total_cells {
            let actual_total = as_number(agent_total, TOTAL_FIELD)?;
            let tolerance = config.tolerances.total_cells.value;
            let diff = (actual_total - expected_total).abs();
            let total_pass = diff <= tolerance;

            metrics.insert("total_cells_actual".into(), agent_total.clone());
            metrics.insert("total_cells_expected".into(), Value::from(expected_total));
            metrics.insert("total_cells_diff".into(), Value::from(diff));
            metrics.insert("total_cells_pass".into(), Value::Bool(total_pass));

            if !total_pass {
                all_pass = false;
                failures.push(format!(
                    "total_cells: {} vs {} (diff: {}, tolerance: {})",
                    agent_total, expected_total, diff, tolerance
                ));
            }

            lines.push(format!(
                "Total cells: {} vs {} {}",
                agent_total,
                expected_total,
                mark(total_pass)
            ));
            lines.push(String::new());
        }

        lines.push(format!(
            "Cell type percentages (tolerance: ±{}%):",
            pct_tolerance
        ));

        for (cell_type, &expected) in &config.ground_truth.cell_type_distribution {
            let Some(actual_raw) = agent_distribution.get(cell_type) else {
                all_pass = false;
                failures.push(format!("Missing cell type: {}", cell_type));
                metrics.insert(format!("{}_actual", cell_type), Value::Null);
                metrics.insert(format!("{}_expected", cell_type), Value::from(expected));
                metrics.insert(format!("{}_diff", cell_type), Value::Null);
                metrics.insert(format!("{}_pass", cell_type), Value::Bool(false));
                lines.push(format!("  ✗ {}: MISSING vs {:.4}%", cell_type, expected));
                continue;
            };

            let actual = as_number(actual_raw, &format!("{}.{}", DISTRIBUTION_FIELD, cell_type))?;
            let diff = (actual - expected).abs();
            let within = diff <= pct_tolerance;

            metrics.insert(format!("{}_actual", cell_type), actual_raw.clone());
            metrics.insert(format!("{}_expected", cell_type), Value::from(expected));
            metrics.insert(format!("{}_diff", cell_type), Value::from(diff));
            metrics.insert(format!("{}_pass", cell_type), Value::Bool(within));

            lines.push(format!(
                "  {} {}: {:.4}% vs {:.4}% (diff: {:.4}%)",
                mark(within),
                cell_type,
                actual,
                expected,
                diff
            ));

            if !within {
                all_pass = false;
                failures.push(format!(
                    "{}: {:.4}% vs {:.4}% (diff: {:.4}%, tolerance: {}%)",
                    cell_type, actual, expected, diff, pct_tolerance
                ));
            }
        }

        let extra_types: Vec<String> = agent_distribution
            .keys()
            .filter(|k| !config.ground_truth.cell_type_distribution.contains_key(*k))
            .cloned()
            .collect();
        if !extra_types.is_empty() {
            metrics.insert("extra_cell_types".into(), serde_json::to_value(&extra_types)?);
            failures.push(format!(
                "Extra cell types not in ground truth: {}",
                quoted_list(&extra_types)
            ));
            lines.push(String::new());
            lines.push(format!(
                "Extra cell types (not in ground truth): {}",
                quoted_list(&extra_types)
            ));
        }

        let mut reasoning = vec![format!("Distribution Comparison: {}", verdict(all_pass)), String::new()];
        reasoning.extend(lines);
        if !all_pass {
            reasoning.push(String::new());
            reasoning.push("Failures:".to_string());
            reasoning.extend(failures.iter().map(|f| format!("  - {}", f)));
        }

        Ok(GraderResult::graded(all_pass, metrics, reasoning.join("\n"), answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "ground_truth": {
                "total_cells": 5000,
                "cell_type_distribution": {"T cell": 40.0, "B cell": 35.0, "Macrophage": 25.0}
            },
            "tolerances": {
                "total_cells": {"type": "absolute", "value": 100},
                "cell_type_percentages": {"type": "absolute", "value": 3.0}
            }
        })
    }

    fn grade(answer: Value, config: &Value) -> GraderResult {
        DistributionComparisonGrader
            .evaluate_answer(answer.as_object().unwrap(), config)
            .unwrap()
    }

    #[test]
    fn test_matching_distribution_passes() {
        let result = grade(
            json!({
                "total_cells": 5050,
                "cell_type_distribution": {"T cell": 41.5, "B cell": 33.0, "Macrophage": 25.5}
            }),
            &config(),
        );

        assert_eq!(result.passed, Some(true));
        assert_eq!(result.metric_f64("total_cells_diff"), Some(50.0));
        assert_eq!(result.metric_bool("B cell_pass"), Some(true));
        assert!(result.reasoning.contains("  ✓ T cell: 41.5000% vs 40.0000% (diff: 1.5000%)"));
        assert!(!result.reasoning.contains("Failures:"));
    }

    #[test]
    fn test_missing_cell_type_fails() {
        let result = grade(
            json!({
                "total_cells": 5000,
                "cell_type_distribution": {"T cell": 40.0, "B cell": 35.0}
            }),
            &config(),
        );

        assert_eq!(result.passed, Some(false));
        assert!(result.metrics["Macrophage_actual"].is_null());
        assert_eq!(result.metric_bool("Macrophage_pass"), Some(false));
        assert!(result.reasoning.contains("  ✗ Macrophage: MISSING vs 25.0000%"));
        assert!(result.reasoning.contains("  - Missing cell type: Macrophage"));
    }

    #[test]
    fn test_out_of_tolerance_percentage_fails() {
        let result = grade(
            json!({
                "total_cells": 5000,
                "cell_type_distribution": {"T cell": 50.0, "B cell": 25.0, "Macrophage": 25.0}
            }),
            &config(),
        );

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.metric_f64("T cell_diff"), Some(10.0));
        assert_eq!(result.metric_bool("Macrophage_pass"), Some(true));
    }

    #[test]
    fn test_extra_cell_types_are_informational() {
        let result = grade(
            json!({
                "total_cells": 5000,
                "cell_type_distribution": {
                    "T cell": 40.0, "B cell": 35.0, "Macrophage": 20.0, "NK cell": 5.0
                }
            }),
            &config(),
        );

        assert_eq!(result.passed, Some(true));
        assert_eq!(result.metrics["extra_cell_types"], json!(["NK cell"]));
        assert!(
            result
                .reasoning
                .contains("Extra cell types (not in ground truth): ['NK cell']")
        );
    }

    #[test]
    fn test_total_cells_outside_tolerance() {
        let result = grade(
            json!({
                "total_cells": 4000,
                "cell_type_distribution": {"T cell": 40.0, "B cell": 35.0, "Macrophage": 25.0}
            }),
            &config(),
        );

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.metric_bool("total_cells_pass"), Some(false));
        assert!(result.reasoning.contains("Total cells: 4000 vs 5000 ✗"));
    }

    #[test]
    fn test_default_percentage_tolerance() {
        let config = json!({
            "ground_truth": {"cell_type_distribution": {"A": 50.0, "B": 50.0}}
        });
        let within = grade(
            json!({"total_cells": 10, "cell_type_distribution": {"A": 52.9, "B": 47.1}}),
            &config,
        );
        let outside = grade(
            json!({"total_cells": 10, "cell_type_distribution": {"A": 53.5, "B": 46.5}}),
            &config,
        );

        assert!(within.is_pass());
        assert!(!within.metrics.contains_key("total_cells_pass"));
        assert!(!outside.is_pass());
    }

    #[test]
    fn test_missing_required_fields() {
        let no_total = grade(json!({"cell_type_distribution": {}}), &config());
        assert_eq!(
            no_total.reasoning,
            "Agent answer missing required field: total_cells"
        );

        let no_dist = grade(json!({"total_cells": 10}), &config());
        assert_eq!(
            no_dist.reasoning,
            "Agent answer missing required field: cell_type_distribution"
        );
    }

    #[test]
    fn test_non_object_distribution_is_error() {
        let err = DistributionComparisonGrader
            .evaluate_answer(
                json!({"total_cells": 10, "cell_type_distribution": [1, 2]})
                    .as_object()
                    .unwrap(),
                &config(),
            )
            .unwrap_err();
        assert!(matches!(err, GraderError::InvalidField { .. }));
    }
}
