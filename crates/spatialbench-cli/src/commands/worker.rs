//! Worker subcommand used by process-based batches
//!
//! Prints exactly one JSON result record on stdout, including when the
//! evaluation fails before a record could be produced, and exits 0.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use spatialbench_eval::{EvalError, EvalResultRecord, EvalRunner, HarnessConfig};
use spatialbench_eval::tasks::load_task_file;

use super::{GlobalOptions, build_agent, harness_config};
use crate::args::AgentArgs;

pub async fn execute(
    global: &GlobalOptions,
    spec: &Path,
    run_id: &str,
    agent: &AgentArgs,
) -> Result<()> {
    let start = Instant::now();
    let record = match evaluate(global, spec, run_id, agent).await {
        Ok(record) => record,
        Err(e) => {
            let eval_id = spec
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| spec.display().to_string());
            tracing::error!(eval_id = %eval_id, error = %e, "worker could not evaluate spec");
            let mut record =
                EvalResultRecord::from_error(eval_id, &e, start.elapsed().as_secs_f64());
            record.metadata.insert("run_id".into(), run_id.into());
            record
        }
    };

    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}

async fn evaluate(
    global: &GlobalOptions,
    spec_path: &Path,
    run_id: &str,
    agent: &AgentArgs,
) -> Result<EvalResultRecord, EvalError> {
    let config: HarnessConfig = harness_config(global, agent)
        .map_err(|e| EvalError::Worker(format!("{:#}", e)))?
        .with_run_id(run_id);
    let adapter =
        build_agent(agent, &config).map_err(|e| EvalError::Worker(format!("{:#}", e)))?;

    let spec = load_task_file(spec_path)?;
    let start = Instant::now();
    let runner = EvalRunner::from_config(config)?;
    match runner.run(&spec, &adapter).await {
        Ok(record) => Ok(record),
        Err(e) => Ok(runner.error_record(&spec.id, &e, start.elapsed())),
    }
}
