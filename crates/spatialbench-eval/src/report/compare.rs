//! Cross-model comparison of batch results
//!
//! Expects one sub-directory per model, each holding a `batch_results.json`.
//! Older result files that are a bare list of records are accepted too.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::SUMMARY_FILE;
use crate::summary::percentage;

/// Comparison report file written into the results directory
pub const COMPARISON_FILE: &str = "comparison_summary.json";

/// Headline numbers of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub total_evals: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_duration_s: f64,
    pub total_duration_s: f64,
}

/// An eval on which models reached different outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disagreement {
    pub eval: String,
    pub outcomes: BTreeMap<String, Option<bool>>,
}

/// Comparison across models
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelComparison {
    pub models: BTreeMap<String, ModelStats>,
    pub disagreements: Vec<Disagreement>,
}

impl ModelComparison {
    /// Load every `<dir>/<model>/batch_results.json`
    pub fn load(results_dir: impl AsRef<Path>) -> Result<Self> {
        let results_dir = results_dir.as_ref();
        let entries = std::fs::read_dir(results_dir)
            .with_context(|| format!("Failed to read results directory: {:?}", results_dir))?;

        let mut loaded = BTreeMap::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let model_dir = entry.path();
            if !model_dir.is_dir() {
                continue;
            }
            let file = model_dir.join(SUMMARY_FILE);
            if !file.exists() {
                continue;
            }
            let model = entry.file_name().to_string_lossy().to_string();
            match read_value(&file) {
                Ok(value) => {
                    loaded.insert(model, value);
                }
                Err(e) => tracing::warn!("Failed to load {:?}: {}", file, e),
            }
        }

        Ok(Self::from_summaries(&loaded))
    }

    /// Build a comparison from raw summary documents keyed by model
    pub fn from_summaries(summaries: &BTreeMap<String, Value>) -> Self {
        let mut models = BTreeMap::new();
        let mut outcomes: BTreeMap<String, BTreeMap<String, Option<bool>>> = BTreeMap::new();

        for (model, document) in summaries {
            let (metadata, results) = split_document(document);

            let passed_count = results
                .iter()
                .filter(|r| r.get("passed").and_then(Value::as_bool) == Some(true))
                .count();
            let failed_count = results
                .iter()
                .filter(|r| r.get("passed").and_then(Value::as_bool) == Some(false))
                .count();

            let total = count(metadata, "total_evals").unwrap_or(results.len());
            let passed = count(metadata, "passed").unwrap_or(passed_count);
            let stats = ModelStats {
                total_evals: total,
                passed,
                failed: count(metadata, "failed").unwrap_or(failed_count),
                pass_rate: number(metadata, "pass_rate").unwrap_or_else(|| percentage(passed, total)),
                avg_duration_s: number(metadata, "avg_duration_s").unwrap_or(0.0),
                total_duration_s: number(metadata, "total_duration_s").unwrap_or(0.0),
            };
            models.insert(model.clone(), stats);

            for result in results {
                let eval = ["eval", "eval_id", "test_id"]
                    .iter()
                    .find_map(|key| result.get(*key).and_then(Value::as_str));
                if let Some(eval) = eval {
                    outcomes
                        .entry(eval.to_string())
                        .or_default()
                        .insert(model.clone(), result.get("passed").and_then(Value::as_bool));
                }
            }
        }

        let disagreements = outcomes
            .into_iter()
            .filter(|(_, by_model)| {
                let mut values = by_model.values();
                values
                    .next()
                    .is_some_and(|first| values.any(|other| other != first))
            })
            .map(|(eval, outcomes)| Disagreement { eval, outcomes })
            .collect();

        Self {
            models,
            disagreements,
        }
    }

    /// Write `comparison_summary.json` into `results_dir`
    pub fn write(&self, results_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = results_dir.as_ref().join(COMPARISON_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write comparison report: {:?}", path))?;
        Ok(path)
    }

    /// Summary table plus the disagreement listing
    pub fn render(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{:=<100}\n", ""));
        output.push_str("MODEL COMPARISON SUMMARY\n");
        output.push_str(&format!("{:=<100}\n\n", ""));
        output.push_str(&format!(
            "{:<20}  {:<8}  {:<8}  {:<8}  {:<12}  {:<12}  {:<12}\n",
            "Model", "Total", "Passed", "Failed", "Pass Rate", "Avg Time", "Total Time"
        ));
        output.push_str(&format!("{:-<100}\n", ""));

        for (model, stats) in &self.models {
            output.push_str(&format!(
                "{:<20}  {:<8}  {:<8}  {:<8}  {:<12}  {:<12}  {:<12}\n",
                model,
                stats.total_evals,
                stats.passed,
                stats.failed,
                format!("{:.1}%", stats.pass_rate),
                format!("{:.1}s", stats.avg_duration_s),
                format!("{:.1}m", stats.total_duration_s / 60.0)
            ));
        }
        output.push('\n');

        output.push_str(&format!("{:=<100}\n", ""));
        if self.disagreements.is_empty() {
            output.push_str("No disagreements found - all models agree on all evaluations\n");
            output.push_str(&format!("{:=<100}\n", ""));
            return output;
        }

        output.push_str("EVALUATIONS WITH DISAGREEMENTS\n");
        output.push_str(&format!("{:=<100}\n\n", ""));
        for disagreement in &self.disagreements {
            output.push_str(&format!("  {}\n", disagreement.eval));
            for (model, passed) in &disagreement.outcomes {
                let status = match passed {
                    Some(true) => "✓ PASSED",
                    Some(false) => "✗ FAILED",
                    None => "? NULL",
                };
                output.push_str(&format!("    {}: {}\n", model, status));
            }
            output.push('\n');
        }
        output
    }
}

fn read_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// `(metadata, results)` of a summary document or a bare record list
fn split_document(document: &Value) -> (Option<&Value>, &[Value]) {
    match document {
        Value::Array(results) => (None, results.as_slice()),
        Value::Object(map) => (
            map.get("metadata"),
            map.get("results")
                .and_then(Value::as_array)
                .map(|r| r.as_slice())
                .unwrap_or(&[]),
        ),
        _ => (None, &[]),
    }
}

fn count(metadata: Option<&Value>, key: &str) -> Option<usize> {
    metadata?.get(key)?.as_u64().map(|n| n as usize)
}

fn number(metadata: Option<&Value>, key: &str) -> Option<f64> {
    metadata?.get(key)?.as_f64()
}
