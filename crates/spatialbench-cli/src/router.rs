//! Command routing

use anyhow::Result;

use crate::args::{Cli, Commands};
use crate::commands::{self, GlobalOptions};

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> Result<()> {
    let global = GlobalOptions {
        config: cli.config,
        root: cli.root,
        log_json: cli.log_json,
    };

    match cli.command {
        Commands::Run {
            spec,
            agent,
            output,
        } => commands::run::execute(&global, &spec, &agent, output.as_deref()).await,
        Commands::Batch {
            dir,
            agent,
            output,
            parallel,
            in_process,
            no_prefetch,
            run_id,
            format,
        } => {
            let options = commands::batch::BatchOptions {
                output,
                parallel,
                in_process,
                no_prefetch,
                run_id,
                format,
            };
            commands::batch::execute(&global, &dir, &agent, options).await
        }
        Commands::Worker {
            spec,
            run_id,
            agent,
        } => commands::worker::execute(&global, &spec, &run_id, &agent).await,
        Commands::Validate { paths } => commands::validate::execute(&paths),
        Commands::Grade {
            spec,
            answer,
            transcript,
        } => commands::grade::execute(&spec, answer.as_deref(), transcript.as_deref()),
        Commands::List { dir } => commands::list::execute(&dir),
        Commands::Report { input, format } => commands::report::show(&input, &format),
        Commands::Compare { dir } => commands::report::compare(&dir),
    }
}
