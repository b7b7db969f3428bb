//! CLI argument definitions using clap
//!
//! - spatialbench run <spec>            # Run one evaluation
//! - spatialbench batch <dir>           # Run every spec under a directory
//! - spatialbench validate <path>...    # Check specs without running them
//! - spatialbench grade --spec <spec>   # Grade a saved answer or transcript
//! - spatialbench list / report / compare

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spatialbench")]
#[command(about = "SpatialBench - benchmark harness for spatial-omics analysis agents")]
#[command(version)]
pub struct Cli {
    /// Harness configuration file (JSON or YAML)
    #[arg(long, global = true, env = "SPATIALBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for cache, workspaces and results
    #[arg(long, global = true, env = "SPATIALBENCH_ROOT")]
    pub root: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that configure the agent and its evaluation
#[derive(Args, Clone, Debug, Default)]
pub struct AgentArgs {
    /// Agent command line; `{workspace}` and `{model}` are substituted.
    /// Defaults to Claude Code in print mode.
    #[arg(long, env = "SPATIALBENCH_AGENT_CMD")]
    pub agent_cmd: Option<String>,

    /// Model used by the agent and recorded in results
    #[arg(long, env = "SPATIALBENCH_MODEL")]
    pub model: Option<String>,

    /// Agent timeout in seconds for tasks that do not set one
    #[arg(long)]
    pub agent_timeout: Option<u64>,

    /// Keep workspaces after evaluation
    #[arg(long)]
    pub keep_workspace: bool,
}

impl AgentArgs {
    /// The same flags as command-line arguments, for worker processes
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(cmd) = &self.agent_cmd {
            args.push("--agent-cmd".to_string());
            args.push(cmd.clone());
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(timeout) = self.agent_timeout {
            args.push("--agent-timeout".to_string());
            args.push(timeout.to_string());
        }
        if self.keep_workspace {
            args.push("--keep-workspace".to_string());
        }
        args
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single evaluation
    Run {
        /// Task spec file
        spec: PathBuf,

        #[command(flatten)]
        agent: AgentArgs,

        /// Also write the result record to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Run every task spec found under a directory
    Batch {
        /// Directory of task specs (or a single spec file)
        dir: PathBuf,

        #[command(flatten)]
        agent: AgentArgs,

        /// Output directory for batch_results.json
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Number of concurrent evaluations
        #[arg(long, short = 'j')]
        parallel: Option<usize>,

        /// Run evaluations in this process even when parallel
        #[arg(long)]
        in_process: bool,

        /// Skip fetching datasets before the batch starts
        #[arg(long)]
        no_prefetch: bool,

        /// Fixed run id
        #[arg(long)]
        run_id: Option<String>,

        /// Output format (json, markdown, table)
        #[arg(long, short, default_value = "table")]
        format: String,
    },

    /// Run one evaluation and print its record as JSON (used by batch)
    #[command(hide = true)]
    Worker {
        /// Task spec file
        #[arg(long)]
        spec: PathBuf,

        /// Batch run id
        #[arg(long)]
        run_id: String,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Validate task specs without running them
    Validate {
        /// Spec files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Grade a saved answer or transcript against a task spec
    Grade {
        /// Task spec file
        #[arg(long)]
        spec: PathBuf,

        /// Answer JSON file
        #[arg(long, conflicts_with = "transcript", required_unless_present = "transcript")]
        answer: Option<PathBuf>,

        /// Transcript JSON file (list of messages)
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// List available task specs by category
    List {
        /// Directory of task specs
        #[arg(default_value = "evals")]
        dir: PathBuf,
    },

    /// Show a report for a previous batch
    Report {
        /// batch_results.json file
        input: PathBuf,

        /// Output format (json, markdown, table)
        #[arg(long, short, default_value = "table")]
        format: String,
    },

    /// Compare batch results across models
    Compare {
        /// Directory with one sub-directory of results per model
        dir: PathBuf,
    },
}
