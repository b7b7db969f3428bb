//! Harness configuration
//!
//! Configuration options for running evaluations and batches.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for evaluation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Root directory holding the cache, workspaces and results
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Dataset cache directory (default: `<root>/cache`)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Workspace directory (default: `<root>/workspace`)
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,

    /// Output directory for batch results (default: `<root>/results`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Whether to keep workspaces after each evaluation
    #[serde(default)]
    pub keep_workspace: bool,

    /// Number of concurrent evaluations in a batch
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Agent timeout in seconds when the task does not set one
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,

    /// Extra time granted to the adapter before the harness gives up on it
    #[serde(default = "default_agent_grace")]
    pub agent_grace_secs: u64,

    /// Dataset download timeout in seconds when the task does not set one
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// File the agent writes its answer to, inside the workspace
    #[serde(default = "default_answer_filename")]
    pub answer_filename: String,

    /// Model name recorded in the batch summary
    #[serde(default = "default_model")]
    pub model: String,

    /// Fetch every referenced dataset once before a batch starts
    #[serde(default = "default_prefetch")]
    pub prefetch: bool,

    /// Fixed run id (default: derived from the batch start time)
    #[serde(default)]
    pub run_id: Option<String>,

    /// Command used for dataset URIs with a non-HTTP, non-file scheme.
    /// `{uri}` and `{dest}` are substituted.
    #[serde(default = "default_fetch_command")]
    pub fetch_command: Vec<String>,

    /// Age in seconds after which a cache lock is considered abandoned
    #[serde(default = "default_lock_stale")]
    pub lock_stale_secs: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".spatialbench")
}

fn default_parallel() -> usize {
    1
}

fn default_agent_timeout() -> u64 {
    600
}

fn default_agent_grace() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    1800
}

fn default_answer_filename() -> String {
    "eval_answer.json".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_prefetch() -> bool {
    true
}

fn default_fetch_command() -> Vec<String> {
    ["latch", "cp", "{uri}", "{dest}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_lock_stale() -> u64 {
    2 * 60 * 60
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            cache_dir: None,
            workspace_dir: None,
            output_dir: None,
            keep_workspace: false,
            parallel: default_parallel(),
            agent_timeout_secs: default_agent_timeout(),
            agent_grace_secs: default_agent_grace(),
            download_timeout_secs: default_download_timeout(),
            answer_filename: default_answer_filename(),
            model: default_model(),
            prefetch: default_prefetch(),
            run_id: None,
            fetch_command: default_fetch_command(),
            lock_stale_secs: default_lock_stale(),
        }
    }
}

impl HarnessConfig {
    /// Create a config rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load a config from a JSON or YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = if path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
        {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))?
        };

        Ok(config)
    }

    /// Effective cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.root.join("cache"))
    }

    /// Effective workspace directory
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(|| self.root.join("workspace"))
    }

    /// Effective batch output directory
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.root.join("results"))
    }

    /// Set the root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Keep workspaces after evaluation
    pub fn with_keep_workspace(mut self, keep: bool) -> Self {
        self.keep_workspace = keep;
        self
    }

    /// Set batch parallelism
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the default agent timeout
    pub fn with_agent_timeout(mut self, secs: u64) -> Self {
        self.agent_timeout_secs = secs;
        self
    }

    /// Set the grace period added on top of the agent timeout
    pub fn with_agent_grace(mut self, secs: u64) -> Self {
        self.agent_grace_secs = secs;
        self
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use a fixed run id
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Enable or disable batch prefetch
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }
}
