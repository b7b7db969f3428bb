//! SpatialBench CLI
//!
//! Runs spatial transcriptomics evaluations against an agent, one at a time
//! or as a batch, and reports on the results.
//!
//! Logs go to stderr (`RUST_LOG` controls the level) so that stdout only
//! carries command output. The `worker` subcommand relies on this: its
//! stdout is exactly one JSON result record.

mod args;
mod commands;
mod console;
mod router;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use args::{AgentArgs, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    router::route(cli).await
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
