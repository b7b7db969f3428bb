//! Numeric tolerance grader

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{as_number, mark, parse_config, verdict};
use crate::{AgentAnswer, GraderError, GraderKind, GraderOutcome, GraderResult, Metrics};

#[derive(Debug, Default, Deserialize)]
struct NumericConfig {
    #[serde(default)]
    ground_truth: BTreeMap<String, Value>,
    #[serde(default)]
    tolerances: BTreeMap<String, Tolerance>,
}

/// How far an answer may deviate from the expected value
#[derive(Debug, Clone, Deserialize)]
struct Tolerance {
    #[serde(rename = "type", default = "absolute")]
    kind: String,
    #[serde(default)]
    value: f64,
}

fn absolute() -> String {
    "absolute".to_string()
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            kind: absolute(),
            value: 0.0,
        }
    }
}

/// Outcome of checking a single field
struct FieldCheck {
    within: bool,
    error: f64,
}

impl Tolerance {
    fn check(&self, actual: f64, expected: f64) -> FieldCheck {
        match self.kind.as_str() {
            "absolute" => {
                let error = (actual - expected).abs();
                FieldCheck {
                    within: error <= self.value,
                    error,
                }
            }
            "relative" => {
                let error = if expected != 0.0 {
                    (actual - expected).abs() / expected.abs()
                } else {
                    f64::INFINITY
                };
                FieldCheck {
                    within: error <= self.value,
                    error,
                }
            }
            "min" => FieldCheck {
                within: actual >= expected,
                error: if actual < expected { expected - actual } else { 0.0 },
            },
            "max" => FieldCheck {
                within: actual <= expected,
                error: if actual > expected { actual - expected } else { 0.0 },
            },
            _ => FieldCheck {
                within: false,
                error: f64::INFINITY,
            },
        }
    }
}

/// Compares numeric answer fields against ground truth with per-field tolerances
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericToleranceGrader;

impl Grader for NumericToleranceGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::NumericTolerance
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: NumericConfig = parse_config(config)?;

        let mut metrics = Metrics::new();
        let mut lines = Vec::new();
        let mut failures = Vec::new();
        let mut all_pass = true;

        for (field, expected_raw) in &config.ground_truth {
            let expected = expected_raw.as_f64().ok_or_else(|| {
                GraderError::InvalidConfig(format!("ground_truth.{} must be a number", field))
            })?;

            let Some(actual_raw) = answer.get(field) else {
                all_pass = false;
                failures.push(format!("Missing field: {}", field));
                continue;
            };
            let actual = as_number(actual_raw, field)?;

            let tolerance = config.tolerances.get(field).cloned().unwrap_or_default();
            let check = tolerance.check(actual, expected);

            metrics.insert(format!("{}_actual", field), actual_raw.clone());
            metrics.insert(format!("{}_expected", field), expected_raw.clone());
            metrics.insert(format!("{}_error", field), Value::from(check.error));
            metrics.insert(format!("{}_pass", field), Value::Bool(check.within));

            lines.push(match tolerance.kind.as_str() {
                "min" => format!(
                    "- {}: {} (minimum: {}) {}",
                    field,
                    actual_raw,
                    expected_raw,
                    mark(check.within)
                ),
                "max" => format!(
                    "- {}: {} (maximum: {}) {}",
                    field,
                    actual_raw,
                    expected_raw,
                    mark(check.within)
                ),
                _ => format!(
                    "- {}: {} vs {} (error: {:.2}) {}",
                    field,
                    actual_raw,
                    expected_raw,
                    check.error,
                    mark(check.within)
                ),
            });

            if !check.within {
                all_pass = false;
                failures.push(match tolerance.kind.as_str() {
                    "min" => format!(
                        "{}: {} (minimum required: {})",
                        field, actual_raw, expected_raw
                    ),
                    "max" => format!(
                        "{}: {} (maximum allowed: {})",
                        field, actual_raw, expected_raw
                    ),
                    _ => format!(
                        "{}: {} vs {} (error: {:.2}, tolerance: {})",
                        field, actual_raw, expected_raw, check.error, tolerance.value
                    ),
                });
            }
        }

        let mut reasoning = vec![format!("Numeric Tolerance Check: {}", verdict(all_pass)), String::new()];
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

    fn answer(value: Value) -> AgentAnswer {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_absolute_within_tolerance() {
        let config = json!({
            "ground_truth": {"total_cells": 1000},
            "tolerances": {"total_cells": {"type": "absolute", "value": 50}}
        });
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"total_cells": 1030})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(true));
        assert_eq!(result.metric_f64("total_cells_error"), Some(30.0));
        assert_eq!(result.metric_bool("total_cells_pass"), Some(true));
        assert!(result.reasoning.starts_with("Numeric Tolerance Check: PASS"));
        assert!(result.reasoning.contains("- total_cells: 1030 vs 1000 (error: 30.00) ✓"));
    }

    #[test]
    fn test_absolute_error_is_symmetric() {
        let config = json!({
            "ground_truth": {"n": 100.0},
            "tolerances": {"n": {"type": "absolute", "value": 5}}
        });
        let above = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"n": 112.5})), &config)
            .unwrap();
        let below = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"n": 87.5})), &config)
            .unwrap();

        assert_eq!(above.metric_f64("n_error"), below.metric_f64("n_error"));
        assert_eq!(above.passed, below.passed);
    }

    #[test]
    fn test_relative_with_zero_expected_is_infinite() {
        let config = json!({
            "ground_truth": {"ratio": 0},
            "tolerances": {"ratio": {"type": "relative", "value": 0.1}}
        });
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"ratio": 0.01})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.metric_bool("ratio_pass"), Some(false));
    }

    #[test]
    fn test_relative_within_tolerance() {
        let config = json!({
            "ground_truth": {"area": 200},
            "tolerances": {"area": {"type": "relative", "value": 0.1}}
        });
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"area": 215})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(true));
        assert!((result.metric_f64("area_error").unwrap() - 0.075).abs() < 1e-9);
    }

    #[test]
    fn test_min_and_max_bounds() {
        let config = json!({
            "ground_truth": {"clusters": 5, "doublets": 0.1},
            "tolerances": {
                "clusters": {"type": "min"},
                "doublets": {"type": "max"}
            }
        });
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"clusters": 3, "doublets": 0.05})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.metric_f64("clusters_error"), Some(2.0));
        assert_eq!(result.metric_f64("doublets_error"), Some(0.0));
        assert!(result.reasoning.contains("clusters: 3 (minimum required: 5)"));
        assert!(result.reasoning.contains("- doublets: 0.05 (maximum: 0.1) ✓"));
    }

    #[test]
    fn test_missing_tolerance_means_exact() {
        let config = json!({"ground_truth": {"k": 7}});
        let exact = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"k": 7})), &config)
            .unwrap();
        let off = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"k": 8})), &config)
            .unwrap();

        assert!(exact.is_pass());
        assert!(!off.is_pass());
    }

    #[test]
    fn test_unknown_tolerance_type_fails_field() {
        let config = json!({
            "ground_truth": {"k": 7},
            "tolerances": {"k": {"type": "fuzzy", "value": 100}}
        });
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"k": 7})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(false));
        assert!(result.metrics["k_error"].is_null());
    }

    #[test]
    fn test_missing_field_reported_per_field() {
        let config = json!({"ground_truth": {"a": 1, "b": 2}});
        let result = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"a": 1})), &config)
            .unwrap();

        assert_eq!(result.passed, Some(false));
        assert_eq!(result.metric_bool("a_pass"), Some(true));
        assert!(!result.metrics.contains_key("b_actual"));
        assert!(result.reasoning.contains("  - Missing field: b"));
    }

    #[test]
    fn test_non_numeric_answer_is_error() {
        let config = json!({"ground_truth": {"a": 1}});
        let err = NumericToleranceGrader
            .evaluate_answer(&answer(json!({"a": "one"})), &config)
            .unwrap_err();

        assert!(matches!(err, GraderError::InvalidField { .. }));
    }
}
