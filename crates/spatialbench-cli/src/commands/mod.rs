//! CLI commands

pub mod batch;
pub mod grade;
pub mod list;
pub mod report;
pub mod run;
pub mod validate;
pub mod worker;

use std::path::PathBuf;

use anyhow::{Context, Result};
use spatialbench_eval::{CommandAgent, HarnessConfig};

use crate::args::AgentArgs;

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub log_json: bool,
}

impl GlobalOptions {
    /// The same flags as command-line arguments, for worker processes
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        if let Some(root) = &self.root {
            args.push("--root".to_string());
            args.push(root.display().to_string());
        }
        if self.log_json {
            args.push("--log-json".to_string());
        }
        args
    }
}

/// Load the configuration file, then apply command-line overrides
pub fn harness_config(global: &GlobalOptions, agent: &AgentArgs) -> Result<HarnessConfig> {
    let mut config = match &global.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(root) = &global.root {
        config = config.with_root(root);
    }
    if let Some(model) = &agent.model {
        config = config.with_model(model);
    }
    if let Some(timeout) = agent.agent_timeout {
        config = config.with_agent_timeout(timeout);
    }
    if agent.keep_workspace {
        config = config.with_keep_workspace(true);
    }
    Ok(config)
}

/// Agent adapter selected by `--agent-cmd`, Claude Code otherwise
pub fn build_agent(agent: &AgentArgs, config: &HarnessConfig) -> Result<CommandAgent> {
    let model = agent.model.as_deref();
    let adapter = match &agent.agent_cmd {
        Some(cmd) => {
            let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
            let mut adapter = CommandAgent::new(&argv)
                .with_context(|| format!("Invalid agent command: {:?}", cmd))?;
            if let Some(model) = model {
                adapter = adapter.with_model(model);
            }
            adapter
        }
        None => CommandAgent::claude_code(model),
    };
    Ok(adapter.with_answer_filename(&config.answer_filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let global = GlobalOptions {
            root: Some(PathBuf::from("/data/sb")),
            ..Default::default()
        };
        let agent = AgentArgs {
            model: Some("opus".into()),
            agent_timeout: Some(120),
            ..Default::default()
        };
        let config = harness_config(&global, &agent).unwrap();
        assert_eq!(config.root, PathBuf::from("/data/sb"));
        assert_eq!(config.model, "opus");
        assert_eq!(config.agent_timeout_secs, 120);
        assert!(!config.keep_workspace);
    }

    #[test]
    fn test_empty_agent_command_is_rejected() {
        let agent = AgentArgs {
            agent_cmd: Some("   ".into()),
            ..Default::default()
        };
        assert!(build_agent(&agent, &HarnessConfig::default()).is_err());
    }

    #[test]
    fn test_global_flags_forwarded() {
        let global = GlobalOptions {
            config: Some(PathBuf::from("bench.yaml")),
            root: None,
            log_json: true,
        };
        assert_eq!(global.to_args(), vec!["--config", "bench.yaml", "--log-json"]);
    }
}
