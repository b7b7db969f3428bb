//! Task prompt composition

use serde::{Deserialize, Serialize};

const NODE_OPEN: &str = "<ContextualNodeData>";
const NODE_CLOSE: &str = "</ContextualNodeData>";

/// A staged dataset as described to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub path: String,
    pub local_path: String,
    pub id: String,
}

impl ContextNode {
    /// Describe `uri`, staged in the workspace as `local_path`
    pub fn file(uri: &str, local_path: &str) -> Self {
        Self {
            node_type: "File".to_string(),
            path: uri.to_string(),
            local_path: local_path.to_string(),
            id: node_id(uri),
        }
    }
}

/// Node id: the URI without the `latch:///` prefix and data file suffixes
pub fn node_id(uri: &str) -> String {
    uri.replace("latch:///", "")
        .replace(".csv", "")
        .replace(".h5ad", "")
}

/// Full prompt: task text, submission instructions, staged file list and
/// the machine-readable node block
pub fn compose_prompt(task: &str, answer_filename: &str, nodes: &[ContextNode]) -> String {
    let mut prompt = format!(
        "{task}\n\n\
IMPORTANT: When you have completed this task:\n\
1. Write your final answer as a JSON object to a file named `{answer}`\n\
2. The file should contain ONLY the JSON object with the required fields\n\
3. After writing the file, you have completed the task\n\n\
Example {answer}:\n\
{{\n  \"field1\": value1,\n  \"field2\": value2\n}}\n",
        task = task,
        answer = answer_filename,
    );

    if nodes.is_empty() {
        return prompt;
    }

    let files: Vec<String> = nodes
        .iter()
        .map(|node| format!("- {}", node.local_path))
        .collect();
    let node_json = serde_json::to_string(nodes).unwrap_or_else(|_| "[]".to_string());

    prompt.push_str("\n\nHere is the context of the selected nodes the user would like to use: ");
    prompt.push_str(&format!(
        "\n\nThe following data files are available in your current working directory:\n{}\n\nUse these local filenames to access the data.\n",
        files.join("\n")
    ));
    prompt.push_str(NODE_OPEN);
    prompt.push_str(&node_json);
    prompt.push_str(NODE_CLOSE);
    prompt
}

/// Nodes embedded in a composed prompt, if any
pub fn parse_context_nodes(prompt: &str) -> Option<Vec<ContextNode>> {
    let start = prompt.find(NODE_OPEN)? + NODE_OPEN.len();
    let end = prompt[start..].find(NODE_CLOSE)? + start;
    serde_json::from_str(&prompt[start..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        assert_eq!(node_id("latch:///spatialbench/xenium/cells.h5ad"), "spatialbench/xenium/cells");
        assert_eq!(node_id("latch:///meta.csv"), "meta");
    }

    #[test]
    fn test_prompt_without_data() {
        let prompt = compose_prompt("Count the cells.", "eval_answer.json", &[]);
        assert!(prompt.starts_with("Count the cells.\n\nIMPORTANT:"));
        assert!(prompt.contains("named `eval_answer.json`"));
        assert!(!prompt.contains(NODE_OPEN));
    }

    #[test]
    fn test_prompt_lists_files_before_node_block() {
        let nodes = vec![
            ContextNode::file("latch:///a/cells.h5ad", "cells.h5ad"),
            ContextNode::file("latch:///a/meta.csv", "meta.csv"),
        ];
        let prompt = compose_prompt("Task", "eval_answer.json", &nodes);

        let listing = prompt.find("- cells.h5ad\n- meta.csv").unwrap();
        let block = prompt.find(NODE_OPEN).unwrap();
        assert!(listing < block);
        assert!(prompt.ends_with(NODE_CLOSE));

        let parsed = parse_context_nodes(&prompt).unwrap();
        assert_eq!(parsed, nodes);
        assert_eq!(parsed[0].id, "a/cells");
    }
}
