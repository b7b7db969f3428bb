//! Batch evaluation command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use colored::*;
use spatialbench_eval::batch::ProgressCallback;
use spatialbench_eval::{
    BatchCoordinator, BatchProgress, CacheStore, EvalWorker, InProcessWorker, ProcessWorker,
    ReportFormat, TaskLoader, generate_report,
};
use spatialbench_graders::GraderRegistry;

use super::{GlobalOptions, build_agent, harness_config};
use crate::args::AgentArgs;
use crate::console;

/// Batch-only flags
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub in_process: bool,
    pub no_prefetch: bool,
    pub run_id: Option<String>,
    pub format: String,
}

pub async fn execute(
    global: &GlobalOptions,
    dir: &Path,
    agent: &AgentArgs,
    options: BatchOptions,
) -> Result<()> {
    let format: ReportFormat = options.format.parse().map_err(|e: String| anyhow!(e))?;

    let mut config = harness_config(global, agent)?;
    if let Some(output) = options.output {
        config = config.with_output_dir(output);
    }
    if let Some(parallel) = options.parallel {
        config = config.with_parallel(parallel);
    }
    if let Some(run_id) = options.run_id {
        config = config.with_run_id(run_id);
    }
    if options.no_prefetch {
        config = config.with_prefetch(false);
    }

    let spec_paths = TaskLoader::new(dir).discover()?;
    if spec_paths.is_empty() {
        console::warn(&format!("No task specs found in {}", dir.display()));
        return Ok(());
    }

    let cache = Arc::new(CacheStore::from_config(&config).context("Failed to set up dataset cache")?);
    let worker: Arc<dyn EvalWorker> = if config.parallel > 1 && !options.in_process {
        let mut forwarded = global.to_args();
        forwarded.extend(agent.to_args());
        Arc::new(ProcessWorker::current_exe(forwarded).context("Cannot locate own executable")?)
    } else {
        let adapter = build_agent(agent, &config)?;
        Arc::new(InProcessWorker::new(
            config.clone(),
            cache.clone(),
            Arc::new(GraderRegistry::builtin()),
            Arc::new(adapter),
        ))
    };

    console::print_header(&format!(
        "Running {} evaluations with {} (parallel: {})",
        spec_paths.len(),
        config.model,
        config.parallel.max(1)
    ));

    let progress: ProgressCallback = Arc::new(print_progress);
    let coordinator = BatchCoordinator::new(config, cache, worker).with_progress(progress);
    let (summary, path) = coordinator.run_and_write(&spec_paths).await?;

    println!("{}", generate_report(&summary, format)?);
    console::success(&format!("Batch results saved to {}", path.display()));
    Ok(())
}

fn print_progress(progress: BatchProgress) {
    let status = match progress.passed {
        Some(true) => "PASS".green().bold(),
        Some(false) => "FAIL".red().bold(),
        None => "----".yellow(),
    };
    println!(
        "[{}/{}] {} {}",
        progress.completed, progress.total, status, progress.eval_id
    );
}
