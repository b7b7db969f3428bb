//! Single evaluation command

use std::path::Path;

use anyhow::{Context, Result};
use spatialbench_eval::EvalRunner;

use super::{GlobalOptions, build_agent, harness_config};
use crate::args::AgentArgs;
use crate::console;

/// Run one task spec and print its result
pub async fn execute(
    global: &GlobalOptions,
    spec: &Path,
    agent: &AgentArgs,
    output: Option<&Path>,
) -> Result<()> {
    let config = harness_config(global, agent)?;
    let adapter = build_agent(agent, &config)?;
    let runner = EvalRunner::from_config(config)?;

    let record = runner
        .run_file(spec, &adapter)
        .await
        .with_context(|| format!("Evaluation of {:?} failed", spec))?;

    console::print_record(&record);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write result record: {:?}", path))?;
        console::success(&format!("Result saved to {}", path.display()));
    }

    Ok(())
}
