//! Batch summary aggregation
//!
//! Aggregates per-evaluation records into the summary written once per batch.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::EvalResultRecord;
use crate::{round1, round2};

/// Aggregate counters and statistics of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub model: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub run_id: Option<String>,
    pub total_evals: usize,
    pub passed: usize,
    pub failed: usize,
    /// Records with `passed = null`
    pub errors: usize,
    /// Percentage of `total_evals` that passed, one decimal
    pub pass_rate: f64,
    pub avg_duration_s: f64,
    pub total_duration_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cost_per_eval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_steps_per_eval: Option<f64>,
}

/// Batch summary file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub metadata: SummaryMetadata,
    pub results: Vec<EvalResultRecord>,
}

impl BatchSummary {
    /// Load a summary written by [`BatchSummary::write`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch summary: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse batch summary: {:?}", path))
    }

    /// Write the summary as pretty JSON, atomically replacing `path`
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

        let json = serde_json::to_string_pretty(self).context("Failed to serialize summary")?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        std::io::Write::write_all(&mut temp, json.as_bytes())
            .context("Failed to write summary")?;
        temp.persist(path)
            .with_context(|| format!("Failed to persist summary to {:?}", path))?;
        Ok(())
    }

    /// Records with the given outcome
    pub fn with_outcome(&self, passed: Option<bool>) -> impl Iterator<Item = &EvalResultRecord> {
        self.results.iter().filter(move |r| r.passed == passed)
    }
}

/// Computes a [`BatchSummary`] from result records
pub struct SummaryAggregator {
    model: String,
    run_id: Option<String>,
}

impl SummaryAggregator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Aggregate records into a summary
    pub fn aggregate(&self, results: Vec<EvalResultRecord>) -> BatchSummary {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed == Some(true)).count();
        let failed = results.iter().filter(|r| r.passed == Some(false)).count();
        let errors = total - passed - failed;

        let total_duration: f64 = results.iter().filter_map(|r| r.duration_s()).sum();
        let (total_cost, avg_cost) = sum_and_mean(results.iter().filter_map(|r| r.cost()));
        let (total_steps, avg_steps) = sum_and_mean(results.iter().filter_map(|r| r.steps()));

        let metadata = SummaryMetadata {
            model: self.model.clone(),
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            total_evals: total,
            passed,
            failed,
            errors,
            pass_rate: percentage(passed, total),
            avg_duration_s: if total > 0 {
                round2(total_duration / total as f64)
            } else {
                0.0
            },
            total_duration_s: round2(total_duration),
            total_cost: total_cost.map(|c| round_to(c, 4)),
            avg_cost_per_eval: avg_cost.map(|c| round_to(c, 4)),
            total_steps,
            avg_steps_per_eval: avg_steps.map(round1),
        };

        BatchSummary { metadata, results }
    }
}

/// `part / total` as a percentage with one decimal, 0 for an empty total
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

fn sum_and_mean(values: impl Iterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return (None, None);
    }
    let sum: f64 = values.iter().sum();
    (Some(sum), Some(sum / values.len() as f64))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str, passed: Option<bool>, meta: serde_json::Value) -> EvalResultRecord {
        let mut record = EvalResultRecord::new(id);
        record.passed = passed;
        record.metadata = meta.as_object().cloned().unwrap();
        record
    }

    #[test]
    fn test_counts_and_rates() {
        let summary = SummaryAggregator::new("model-x").with_run_id("r1").aggregate(vec![
            record("a", Some(true), json!({"duration_s": 10.0, "total_cost": 0.5, "n_turns": 4})),
            record("b", Some(false), json!({"duration_s": 20.0, "total_cost": 1.5, "n_steps": 10})),
            record("c", None, json!({"duration_s": 30.0})),
        ]);

        let m = &summary.metadata;
        assert_eq!(m.total_evals, 3);
        assert_eq!((m.passed, m.failed, m.errors), (1, 1, 1));
        assert_eq!(m.pass_rate, 33.3);
        assert_eq!(m.avg_duration_s, 20.0);
        assert_eq!(m.total_duration_s, 60.0);
        assert_eq!(m.total_cost, Some(2.0));
        assert_eq!(m.avg_cost_per_eval, Some(1.0));
        assert_eq!(m.total_steps, Some(14.0));
        assert_eq!(m.avg_steps_per_eval, Some(7.0));
        assert_eq!(m.run_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_optional_aggregates_are_omitted() {
        let summary = SummaryAggregator::new("m").aggregate(vec![record("a", Some(true), json!({}))]);
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value["metadata"].get("total_cost").is_none());
        assert!(value["metadata"].get("avg_steps_per_eval").is_none());
        assert_eq!(value["metadata"]["pass_rate"], json!(100.0));
    }

    #[test]
    fn test_unknown_grader_counts_in_total_only() {
        let mut ungraded = record("mystery", None, json!({"duration_s": 1.0}));
        ungraded.push_error(crate::error::ErrorEntry::new("unknown_grader_type", "llm_judge"));
        let summary = SummaryAggregator::new("m").aggregate(vec![ungraded]);
        assert_eq!(summary.metadata.total_evals, 1);
        assert_eq!(summary.metadata.passed + summary.metadata.failed, 0);
        assert_eq!(summary.metadata.errors, 1);
    }

    #[test]
    fn test_empty_batch() {
        let summary = SummaryAggregator::new("m").aggregate(Vec::new());
        assert_eq!(summary.metadata.pass_rate, 0.0);
        assert_eq!(summary.metadata.avg_duration_s, 0.0);
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("batch_results.json");
        let summary = SummaryAggregator::new("m").aggregate(vec![record("a", Some(true), json!({}))]);

        summary.write(&path).unwrap();
        let loaded = BatchSummary::load(&path).unwrap();
        assert_eq!(loaded, summary);
        assert_eq!(loaded.with_outcome(Some(true)).count(), 1);
    }
}
