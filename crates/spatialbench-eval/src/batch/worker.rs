//! Batch workers
//!
//! A worker turns one task spec into exactly one result record. Failures of
//! the worker itself become error records, never errors.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use spatialbench_graders::GraderRegistry;
use tokio::process::Command;

use crate::agent::AgentAdapter;
use crate::cache::CacheStore;
use crate::config::HarnessConfig;
use crate::error::EvalError;
use crate::runner::{EvalResultRecord, EvalRunner};
use crate::tasks::TaskSpec;
use crate::workspace::WorkspaceManager;

/// Runs a single evaluation on behalf of the batch coordinator
#[async_trait]
pub trait EvalWorker: Send + Sync {
    /// Evaluate `spec` (loaded from `spec_path`) under `run_id`
    async fn run_eval(&self, spec_path: &Path, spec: &TaskSpec, run_id: &str) -> EvalResultRecord;
}

/// Runs evaluations inside this process with a shared adapter
pub struct InProcessWorker {
    config: HarnessConfig,
    cache: Arc<CacheStore>,
    registry: Arc<GraderRegistry>,
    adapter: Arc<dyn AgentAdapter>,
}

impl InProcessWorker {
    pub fn new(
        config: HarnessConfig,
        cache: Arc<CacheStore>,
        registry: Arc<GraderRegistry>,
        adapter: Arc<dyn AgentAdapter>,
    ) -> Self {
        Self {
            config,
            cache,
            registry,
            adapter,
        }
    }

    fn runner(&self, run_id: &str) -> EvalRunner {
        let config = self.config.clone().with_run_id(run_id);
        let workspaces = WorkspaceManager::new(config.workspace_dir());
        EvalRunner::new(config, self.cache.clone(), workspaces, self.registry.clone())
    }
}

#[async_trait]
impl EvalWorker for InProcessWorker {
    async fn run_eval(&self, _spec_path: &Path, spec: &TaskSpec, run_id: &str) -> EvalResultRecord {
        let start = Instant::now();
        let runner = self.runner(run_id);
        match runner.run(spec, self.adapter.as_ref()).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(eval_id = %spec.id, error = %e, "evaluation aborted");
                runner.error_record(&spec.id, &e, start.elapsed())
            }
        }
    }
}

/// Runs each evaluation in a fresh `<exe> worker` process.
///
/// Agent adapters may hold process-global state, so isolating every
/// evaluation in its own process keeps concurrent runs independent.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    exe: PathBuf,
    args: Vec<String>,
}

impl ProcessWorker {
    /// Worker spawning `exe`; `args` are appended after the worker flags
    pub fn new(exe: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            exe: exe.into(),
            args,
        }
    }

    /// Worker re-invoking the current executable
    pub fn current_exe(args: Vec<String>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args))
    }

    fn command_args(&self, spec_path: &Path, run_id: &str) -> Vec<String> {
        let mut args = vec![
            "worker".to_string(),
            "--spec".to_string(),
            spec_path.display().to_string(),
            "--run-id".to_string(),
            run_id.to_string(),
        ];
        args.extend(self.args.iter().cloned());
        args
    }

    async fn spawn(&self, spec_path: &Path, run_id: &str) -> Result<EvalResultRecord, String> {
        let output = Command::new(&self.exe)
            .args(self.command_args(spec_path, run_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to spawn {:?}: {}", self.exe, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(format!(
                "worker exited with {}: {}",
                output.status,
                last_line(&stderr)
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| "worker produced no output".to_string())?;
        serde_json::from_str(json).map_err(|e| format!("worker output is not a result record: {}", e))
    }
}

#[async_trait]
impl EvalWorker for ProcessWorker {
    async fn run_eval(&self, spec_path: &Path, spec: &TaskSpec, run_id: &str) -> EvalResultRecord {
        let start = Instant::now();
        tracing::debug!(eval_id = %spec.id, exe = ?self.exe, "spawning worker process");
        match self.spawn(spec_path, run_id).await {
            Ok(record) => record,
            Err(message) => {
                tracing::error!(eval_id = %spec.id, error = %message, "worker failed");
                let mut record = EvalResultRecord::from_error(
                    &spec.id,
                    &EvalError::Worker(message),
                    start.elapsed().as_secs_f64(),
                );
                record.metadata.insert("run_id".into(), Value::from(run_id));
                record
            }
        }
    }
}

fn last_line(s: &str) -> &str {
    s.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}
