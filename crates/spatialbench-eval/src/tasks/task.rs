//! Task spec definition
//!
//! A task spec is the declarative definition of one evaluation: the prompt,
//! the datasets it needs and the grader that scores the answer.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use spatialbench_graders::GraderSpec;

use crate::config::HarnessConfig;
use crate::error::{EvalError, HarnessResult};

/// Dataset references of a task: none, one URI, or a list of URIs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataNode {
    #[default]
    None,
    Single(String),
    Many(Vec<String>),
}

impl DataNode {
    /// All referenced URIs in declaration order
    pub fn uris(&self) -> Vec<String> {
        match self {
            DataNode::None => Vec::new(),
            DataNode::Single(uri) => vec![uri.clone()],
            DataNode::Many(uris) => uris.clone(),
        }
    }
}

/// An evaluation task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique identifier; also the workspace directory name
    pub id: String,

    /// Prompt given to the agent
    pub task: String,

    /// Dataset URIs to stage into the workspace
    #[serde(default)]
    pub data_node: DataNode,

    /// Grader configuration (ungraded when absent)
    #[serde(default)]
    pub grader: Option<GraderSpec>,

    /// Overall timeout in seconds, used for the agent when `agent_timeout` is unset
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Dataset download timeout in seconds
    #[serde(default)]
    pub download_timeout: Option<u64>,

    /// Agent timeout in seconds
    #[serde(default)]
    pub agent_timeout: Option<u64>,
}

impl TaskSpec {
    /// Create a new task spec
    pub fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            data_node: DataNode::None,
            grader: None,
            timeout: None,
            download_timeout: None,
            agent_timeout: None,
        }
    }

    /// Add a dataset reference
    pub fn with_data(mut self, uri: impl Into<String>) -> Self {
        let mut uris = self.data_node.uris();
        uris.push(uri.into());
        self.data_node = if uris.len() == 1 {
            DataNode::Single(uris.remove(0))
        } else {
            DataNode::Many(uris)
        };
        self
    }

    /// Set the grader
    pub fn with_grader(mut self, grader: GraderSpec) -> Self {
        self.grader = Some(grader);
        self
    }

    /// Set the agent timeout
    pub fn with_agent_timeout(mut self, secs: u64) -> Self {
        self.agent_timeout = Some(secs);
        self
    }

    /// Dataset URIs in declaration order
    pub fn data_refs(&self) -> Vec<String> {
        self.data_node.uris()
    }

    /// Agent timeout: `agent_timeout`, then `timeout`, then the config default
    pub fn effective_agent_timeout(&self, config: &HarnessConfig) -> u64 {
        self.agent_timeout
            .or(self.timeout)
            .unwrap_or(config.agent_timeout_secs)
    }

    /// Download timeout: `download_timeout`, then the config default
    pub fn effective_download_timeout(&self, config: &HarnessConfig) -> u64 {
        self.download_timeout
            .unwrap_or(config.download_timeout_secs)
    }

    /// Parse a task spec from JSON text and validate it
    pub fn from_json(json: &str) -> HarnessResult<Self> {
        let spec: TaskSpec =
            serde_json::from_str(json).map_err(|e| EvalError::InvalidTaskSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check required fields and that the id can name a workspace directory
    pub fn validate(&self) -> HarnessResult<()> {
        if self.id.trim().is_empty() {
            return Err(EvalError::InvalidTaskSpec("id must not be empty".into()));
        }
        if self.task.trim().is_empty() {
            return Err(EvalError::InvalidTaskSpec(format!(
                "task prompt of '{}' must not be empty",
                self.id
            )));
        }
        if !is_single_component(&self.id) {
            return Err(EvalError::InvalidTaskSpec(format!(
                "id '{}' must be a single path component",
                self.id
            )));
        }
        if self.data_refs().iter().any(|uri| uri.trim().is_empty()) {
            return Err(EvalError::InvalidTaskSpec(format!(
                "data_node of '{}' contains an empty reference",
                self.id
            )));
        }
        Ok(())
    }
}

/// True when `name` is a plain file or directory name with no traversal
pub(crate) fn is_single_component(name: &str) -> bool {
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
