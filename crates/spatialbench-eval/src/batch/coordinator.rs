//! Batch coordination
//!
//! Loads every spec, assigns one run id, prefetches datasets, fans the
//! evaluations out over a bounded pool and aggregates the records.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::EvalWorker;
use crate::cache::CacheStore;
use crate::config::HarnessConfig;
use crate::error::EvalError;
use crate::runner::EvalResultRecord;
use crate::summary::{BatchSummary, SummaryAggregator};
use crate::tasks::{TaskSpec, load_task_file};

/// Name of the summary file in the output directory
pub const SUMMARY_FILE: &str = "batch_results.json";

/// Progress update after each finished evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub eval_id: String,
    pub passed: Option<bool>,
}

/// Callback for progress updates during a batch
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// A spec file as planned for execution
struct PlannedEval {
    index: usize,
    path: PathBuf,
    spec: Result<TaskSpec, (String, EvalError)>,
}

/// Run id derived from the current time, e.g. `20250114_093000`
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Coordinates a batch of evaluations
pub struct BatchCoordinator {
    config: HarnessConfig,
    cache: Arc<CacheStore>,
    worker: Arc<dyn EvalWorker>,
    progress: Option<ProgressCallback>,
}

impl BatchCoordinator {
    pub fn new(config: HarnessConfig, cache: Arc<CacheStore>, worker: Arc<dyn EvalWorker>) -> Self {
        Self {
            config,
            cache,
            worker,
            progress: None,
        }
    }

    /// Report progress after each evaluation
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every spec and aggregate the records, one per input path
    pub async fn run(&self, spec_paths: &[PathBuf]) -> BatchSummary {
        let run_id = self.config.run_id.clone().unwrap_or_else(new_run_id);
        let start = Instant::now();
        let planned = plan(spec_paths);
        let total = planned.len();

        tracing::info!(
            run_id = %run_id,
            total,
            parallel = self.config.parallel,
            "starting batch"
        );

        if self.config.prefetch {
            self.prefetch(&planned).await;
        }

        let completed = AtomicUsize::new(0);
        let run_id_ref = run_id.as_str();
        let completed_ref = &completed;

        let mut results: Vec<(usize, EvalResultRecord)> = stream::iter(planned)
            .map(|eval| async move {
                let record = match &eval.spec {
                    Ok(spec) => self.worker.run_eval(&eval.path, spec, run_id_ref).await,
                    Err((eval_id, err)) => {
                        tracing::warn!(eval_id = %eval_id, error = %err, "skipping invalid spec");
                        let mut record = EvalResultRecord::from_error(eval_id.clone(), err, 0.0);
                        record.metadata.insert("run_id".into(), Value::from(run_id_ref));
                        record
                    }
                };

                let count = completed_ref.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &self.progress {
                    progress(BatchProgress {
                        completed: count,
                        total,
                        eval_id: record.eval_id.clone(),
                        passed: record.passed,
                    });
                }
                (eval.index, record)
            })
            .buffer_unordered(self.config.parallel.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let records: Vec<EvalResultRecord> = results.into_iter().map(|(_, r)| r).collect();

        tracing::info!(
            run_id = %run_id,
            elapsed_s = start.elapsed().as_secs_f64(),
            "batch finished"
        );

        SummaryAggregator::new(&self.config.model)
            .with_run_id(run_id)
            .aggregate(records)
    }

    /// Run the batch and write `<output_dir>/batch_results.json`
    pub async fn run_and_write(&self, spec_paths: &[PathBuf]) -> Result<(BatchSummary, PathBuf)> {
        let summary = self.run(spec_paths).await;
        let path = self.config.output_dir().join(SUMMARY_FILE);
        Self::write_summary(&summary, &path)?;
        Ok((summary, path))
    }

    /// Persist a summary atomically
    pub fn write_summary(summary: &BatchSummary, path: &Path) -> Result<()> {
        summary.write(path)?;
        tracing::info!("Batch results saved to: {}", path.display());
        Ok(())
    }

    async fn prefetch(&self, planned: &[PlannedEval]) {
        let uris: Vec<String> = planned
            .iter()
            .filter_map(|eval| eval.spec.as_ref().ok())
            .flat_map(|spec| spec.data_refs())
            .collect();
        if uris.is_empty() {
            return;
        }

        let failures = self.cache.prefetch(&uris).await;
        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                "some datasets could not be prefetched; affected evaluations will report it"
            );
        }
    }
}

/// Load every spec, marking later duplicates of an id as invalid
fn plan(spec_paths: &[PathBuf]) -> Vec<PlannedEval> {
    let mut seen = HashSet::new();
    spec_paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let spec = match load_task_file(path) {
                Ok(spec) if !seen.insert(spec.id.clone()) => {
                    let err = EvalError::InvalidTaskSpec(format!(
                        "duplicate eval id '{}' in {}",
                        spec.id,
                        path.display()
                    ));
                    Err((spec.id, err))
                }
                Ok(spec) => Ok(spec),
                Err(err) => Err((fallback_id(path), err)),
            };
            PlannedEval {
                index,
                path: path.clone(),
                spec,
            }
        })
        .collect()
}

/// Best-effort id for a spec file that failed to load
fn fallback_id(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|value| value.get("id").and_then(Value::as_str).map(str::to_string))
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string())
        })
}
