//! SpatialBench evaluation harness
//!
//! Runs spatial transcriptomics tasks against an autonomous analysis agent
//! and grades the structured answers it produces.
//!
//! # Features
//!
//! - **Dataset cache**: content-addressed, download-once staging of remote
//!   datasets shared across concurrent evaluations
//! - **Isolated workspaces**: one working directory per evaluation and run
//! - **Agent adapters**: pluggable agents behind a single async trait, with a
//!   subprocess adapter for command-line agents
//! - **Batch coordination**: bounded parallelism, one record per task, and an
//!   aggregated summary written atomically
//! - **Reports**: JSON, Markdown and terminal tables, plus cross-model
//!   comparison
//!
//! # Example
//!
//! ```rust,ignore
//! use spatialbench_eval::{CommandAgent, EvalRunner, HarnessConfig};
//!
//! let runner = EvalRunner::from_config(HarnessConfig::default())?;
//! let agent = CommandAgent::claude_code(Some("sonnet"));
//! let record = runner.run_file(Path::new("evals/qc/cell_count.json"), &agent).await?;
//! println!("passed: {:?}", record.passed);
//! ```

pub mod agent;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod summary;
pub mod tasks;
pub mod workspace;

// Re-exports for convenience
pub use agent::{AgentAdapter, AgentError, AgentOutcome, CommandAgent};
pub use batch::{BatchCoordinator, BatchProgress, EvalWorker, InProcessWorker, ProcessWorker};
pub use cache::{CacheError, CacheStore, DatasetFetcher, SchemeFetcher};
pub use config::HarnessConfig;
pub use error::{ErrorEntry, EvalError, HarnessResult};
pub use report::{ModelComparison, ReportFormat, generate_report};
pub use runner::{EvalResultRecord, EvalRunner, EvalState};
pub use summary::{BatchSummary, SummaryAggregator, SummaryMetadata};
pub use tasks::{DataNode, TaskLoader, TaskSpec};
pub use workspace::{Workspace, WorkspaceManager};

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
