//! Single evaluation runner
//!
//! Drives one task through `INIT → STAGE_DATA → INVOKE_AGENT →
//! COLLECT_ANSWER → GRADE → CLEANUP → DONE`. Only spec and staging
//! failures are returned as errors; everything after staging degrades the
//! record instead and cleanup always runs.

mod prompt;
mod record;
mod state;

pub use prompt::{ContextNode, compose_prompt, node_id, parse_context_nodes};
pub use record::EvalResultRecord;
pub use state::EvalState;

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::{Map, Value};
use spatialbench_graders::{AgentAnswer, GradeOutcome, GraderRegistry, GraderResult, GraderSpec};

use crate::agent::{AgentAdapter, AgentOutcome};
use crate::cache::{CacheStore, basename};
use crate::config::HarnessConfig;
use crate::error::{EvalError, HarnessResult};
use crate::tasks::{TaskSpec, load_task_file};
use crate::workspace::{Workspace, WorkspaceManager};

/// Runs single evaluations
pub struct EvalRunner {
    config: HarnessConfig,
    cache: Arc<CacheStore>,
    workspaces: WorkspaceManager,
    registry: Arc<GraderRegistry>,
}

impl EvalRunner {
    pub fn new(
        config: HarnessConfig,
        cache: Arc<CacheStore>,
        workspaces: WorkspaceManager,
        registry: Arc<GraderRegistry>,
    ) -> Self {
        Self {
            config,
            cache,
            workspaces,
            registry,
        }
    }

    /// Runner with a scheme-dispatching cache and the built-in graders
    pub fn from_config(config: HarnessConfig) -> HarnessResult<Self> {
        let cache = CacheStore::from_config(&config)
            .map_err(|e| EvalError::Workspace(format!("cannot set up cache: {}", e)))?;
        let workspaces = WorkspaceManager::new(config.workspace_dir());
        Ok(Self::new(
            config,
            Arc::new(cache),
            workspaces,
            Arc::new(GraderRegistry::builtin()),
        ))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<GraderRegistry> {
        &self.registry
    }

    /// Load a task spec file, then run it
    pub async fn run_file(
        &self,
        path: &Path,
        adapter: &dyn AgentAdapter,
    ) -> HarnessResult<EvalResultRecord> {
        let spec = load_task_file(path)?;
        self.run(&spec, adapter).await
    }

    /// Run one evaluation to completion
    pub async fn run(
        &self,
        spec: &TaskSpec,
        adapter: &dyn AgentAdapter,
    ) -> HarnessResult<EvalResultRecord> {
        let start = Instant::now();
        let eval_id = spec.id.as_str();
        let run_id = self.config.run_id.as_deref();

        enter(eval_id, EvalState::Init);
        spec.validate()?;

        enter(eval_id, EvalState::StageData);
        let workspace = self
            .workspaces
            .provision(eval_id, run_id, self.config.keep_workspace)
            .await?;
        tracing::info!(eval_id = %eval_id, workspace = ?workspace.path(), "working directory ready");

        let nodes = match self.stage_data(spec, &workspace).await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!(eval_id = %eval_id, error = %e, "data staging failed");
                enter(eval_id, EvalState::Cleanup);
                self.cleanup(workspace).await;
                return Err(e);
            }
        };

        let mut errors: Vec<EvalError> = Vec::new();

        enter(eval_id, EvalState::InvokeAgent);
        let prompt = compose_prompt(&spec.task, &self.config.answer_filename, &nodes);
        let outcome = self
            .invoke_agent(spec, adapter, &prompt, &workspace, &mut errors)
            .await;

        enter(eval_id, EvalState::CollectAnswer);
        let (answer, agent_metadata) = match outcome {
            Some(AgentOutcome { answer, metadata }) => (answer, metadata),
            None => (None, Map::new()),
        };
        let answer = match answer {
            Some(answer) => Some(answer),
            None => self.read_answer_file(&workspace, &mut errors).await,
        };

        let grader_result = match (&spec.grader, &answer) {
            (Some(grader), Some(answer)) => {
                enter(eval_id, EvalState::Grade);
                self.grade(eval_id, grader, answer, &mut errors)
            }
            (Some(_), None) => {
                tracing::warn!(eval_id = %eval_id, "no answer collected, skipping grading");
                None
            }
            (None, _) => None,
        };

        enter(eval_id, EvalState::Cleanup);
        let workspace_path = workspace.path().to_path_buf();
        self.cleanup(workspace).await;

        let mut record = EvalResultRecord::new(eval_id);
        record.passed = grader_result.as_ref().and_then(|r| r.passed);
        record.agent_answer = answer;
        record.grader_result = grader_result;
        record.metadata = agent_metadata;
        if let Some(agent_duration) = record.metadata.remove("duration_s") {
            record
                .metadata
                .insert("agent_duration_s".into(), agent_duration);
        }
        record.metadata.insert(
            "duration_s".into(),
            Value::from(crate::round2(start.elapsed().as_secs_f64())),
        );
        record.metadata.insert("run_id".into(), Value::from(run_id));
        record.metadata.insert(
            "workspace".into(),
            Value::from(workspace_path.display().to_string()),
        );
        record
            .metadata
            .insert("agent".into(), Value::from(adapter.name()));
        for err in &errors {
            record.push_error(err.to_entry());
        }

        enter(eval_id, EvalState::Done);
        match record.passed {
            Some(true) => tracing::info!(eval_id = %eval_id, "EVAL PASSED"),
            Some(false) => tracing::info!(eval_id = %eval_id, "EVAL FAILED"),
            None => tracing::info!(eval_id = %eval_id, "EVAL NOT GRADED"),
        }
        Ok(record)
    }

    /// Record for an evaluation that failed before producing one
    pub fn error_record(&self, eval_id: &str, err: &EvalError, duration: Duration) -> EvalResultRecord {
        let mut record = EvalResultRecord::from_error(eval_id, err, duration.as_secs_f64());
        record
            .metadata
            .insert("run_id".into(), Value::from(self.config.run_id.as_deref()));
        record
    }

    async fn stage_data(
        &self,
        spec: &TaskSpec,
        workspace: &Workspace,
    ) -> HarnessResult<Vec<ContextNode>> {
        let download_timeout = Duration::from_secs(spec.effective_download_timeout(&self.config));
        let mut nodes = Vec::new();

        for uri in spec.data_refs() {
            let cached = self
                .cache
                .fetch_with_timeout(&uri, Some(download_timeout))
                .await?;
            let file_name = basename(&uri);
            self.workspaces
                .stage(workspace, &cached, &file_name)
                .await?;
            tracing::info!(eval_id = %spec.id, "Linked: {} -> workspace", file_name);
            nodes.push(ContextNode::file(&uri, &file_name));
        }

        Ok(nodes)
    }

    async fn invoke_agent(
        &self,
        spec: &TaskSpec,
        adapter: &dyn AgentAdapter,
        prompt: &str,
        workspace: &Workspace,
        errors: &mut Vec<EvalError>,
    ) -> Option<AgentOutcome> {
        let agent_timeout = spec.effective_agent_timeout(&self.config);
        let limit = Duration::from_secs(agent_timeout + self.config.agent_grace_secs);

        let invocation = AssertUnwindSafe(adapter.invoke(
            prompt,
            workspace.path(),
            Duration::from_secs(agent_timeout),
        ))
        .catch_unwind();

        match tokio::time::timeout(limit, invocation).await {
            Ok(Ok(Ok(outcome))) => {
                if outcome.timed_out() {
                    let secs = outcome
                        .metadata
                        .get("eval_timeout_seconds")
                        .and_then(Value::as_u64)
                        .unwrap_or(agent_timeout);
                    tracing::warn!(eval_id = %spec.id, secs, "agent reported a timeout");
                    errors.push(EvalError::AgentTimeout { secs });
                } else {
                    tracing::info!(eval_id = %spec.id, "agent completed");
                }
                Some(outcome)
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(eval_id = %spec.id, error = %e, "agent error");
                errors.push(e.into());
                None
            }
            Ok(Err(_panic)) => {
                tracing::error!(eval_id = %spec.id, "agent adapter panicked");
                errors.push(EvalError::AgentInvocation(format!(
                    "{} adapter panicked",
                    adapter.name()
                )));
                None
            }
            Err(_) => {
                tracing::error!(eval_id = %spec.id, secs = limit.as_secs(), "agent exceeded harness timeout");
                errors.push(EvalError::AgentTimeout {
                    secs: agent_timeout,
                });
                None
            }
        }
    }

    async fn read_answer_file(
        &self,
        workspace: &Workspace,
        errors: &mut Vec<EvalError>,
    ) -> Option<AgentAnswer> {
        let path = workspace.file(&self.config.answer_filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                let message = format!("failed to read {}: {}", self.config.answer_filename, e);
                tracing::warn!("{}", message);
                errors.push(EvalError::AnswerParse(message));
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(answer)) => {
                tracing::info!("Loaded agent answer from {}", self.config.answer_filename);
                Some(answer)
            }
            Ok(other) => {
                let message = format!(
                    "{} holds a JSON {} instead of an object",
                    self.config.answer_filename,
                    json_kind(&other)
                );
                tracing::warn!("{}", message);
                errors.push(EvalError::AnswerParse(message));
                None
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", self.config.answer_filename, e);
                errors.push(EvalError::AnswerParse(e.to_string()));
                None
            }
        }
    }

    fn grade(
        &self,
        eval_id: &str,
        grader: &GraderSpec,
        answer: &AgentAnswer,
        errors: &mut Vec<EvalError>,
    ) -> Option<GraderResult> {
        match self.registry.grade_answer(grader, answer) {
            GradeOutcome::Graded(result) => {
                tracing::debug!(eval_id = %eval_id, reasoning = %result.reasoning, "grader finished");
                Some(result)
            }
            GradeOutcome::UnknownType { grader_type, .. } => {
                tracing::warn!(eval_id = %eval_id, "Unknown grader type '{}'", grader_type);
                errors.push(EvalError::UnknownGraderType(grader_type));
                None
            }
            GradeOutcome::Failed { message, result } => {
                errors.push(EvalError::GraderRuntime(message));
                Some(result)
            }
        }
    }

    async fn cleanup(&self, workspace: Workspace) {
        if let Err(e) = self
            .workspaces
            .dispose(workspace, self.config.keep_workspace)
            .await
        {
            tracing::warn!(error = %e, "workspace cleanup failed");
        }
    }
}

fn enter(eval_id: &str, state: EvalState) {
    tracing::debug!(eval_id = %eval_id, state = %state, "state transition");
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
