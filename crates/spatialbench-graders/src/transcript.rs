//! Agent transcript model and submitted-answer extraction
//!
//! A transcript is the ordered list of messages exchanged with the agent.
//! The agent submits its final answer by calling the `submit_response` tool
//! with a summary containing an `<EVAL_ANSWER>...</EVAL_ANSWER>` block.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AgentAnswer;

/// Tool name the agent uses to submit its final answer
pub const SUBMIT_TOOL: &str = "submit_response";

/// Opening marker of the answer block
pub const ANSWER_START: &str = "<EVAL_ANSWER>";

/// Closing marker of the answer block
pub const ANSWER_END: &str = "</EVAL_ANSWER>";

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text { text: String },

    /// Tool invocation
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },

    /// Result returned for a tool invocation
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
    },
}

/// A single transcript message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a message
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Assistant text message
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::Text { text: text.into() }])
    }

    /// Assistant message calling the submit tool with the given summary
    pub fn submission(summary: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            vec![ContentBlock::ToolUse {
                id: None,
                name: SUBMIT_TOOL.to_string(),
                input: serde_json::json!({ "summary": summary.into() }),
            }],
        )
    }
}

/// Ordered conversation history
pub type Transcript = Vec<Message>;

fn answer_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<EVAL_ANSWER>(.*?)</EVAL_ANSWER>").expect("answer block pattern is valid")
    })
}

/// What a single tool call contributes to extraction
enum Submission {
    /// Not a submission carrying an answer block
    Absent,
    /// Answer block found and parsed
    Parsed(AgentAnswer),
    /// Answer block found but unusable
    Malformed,
}

fn inspect_block(block: &ContentBlock) -> Submission {
    let ContentBlock::ToolUse { name, input, .. } = block else {
        return Submission::Absent;
    };
    if name != SUBMIT_TOOL {
        return Submission::Absent;
    }

    let summary = input.get("summary").and_then(Value::as_str).unwrap_or("");
    let Some(captures) = answer_block().captures(summary) else {
        return Submission::Absent;
    };

    let body = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(answer)) => Submission::Parsed(answer),
        Ok(_) => {
            tracing::warn!("EVAL_ANSWER block does not contain a JSON object");
            Submission::Malformed
        }
        Err(e) => {
            tracing::warn!("Failed to parse JSON from EVAL_ANSWER block: {}", e);
            Submission::Malformed
        }
    }
}

/// Recover the submitted answer from a transcript.
///
/// Messages are scanned newest first; only assistant messages are considered.
/// The first submit call carrying an answer block decides the outcome: its
/// payload is returned, or `None` if it does not parse.
pub fn extract_answer(transcript: &[Message]) -> Option<AgentAnswer> {
    for message in transcript.iter().rev() {
        if message.role != Role::Assistant {
            continue;
        }
        for block in &message.content {
            match inspect_block(block) {
                Submission::Absent => continue,
                Submission::Parsed(answer) => return Some(answer),
                Submission::Malformed => return None,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(text: &str) -> Message {
        Message::new(Role::User, vec![ContentBlock::Text { text: text.into() }])
    }

    #[test]
    fn test_extracts_answer_from_submission() {
        let transcript = vec![
            user("count the cells"),
            Message::assistant_text("working on it"),
            Message::submission("Done.\n<EVAL_ANSWER>\n{\"total_cells\": 1030}\n</EVAL_ANSWER>"),
        ];

        let answer = extract_answer(&transcript).unwrap();
        assert_eq!(answer["total_cells"], json!(1030));
    }

    #[test]
    fn test_latest_submission_wins() {
        let transcript = vec![
            Message::submission("<EVAL_ANSWER>{\"answer\": \"A\"}</EVAL_ANSWER>"),
            user("try again"),
            Message::submission("<EVAL_ANSWER>{\"answer\": \"C\"}</EVAL_ANSWER>"),
        ];

        let answer = extract_answer(&transcript).unwrap();
        assert_eq!(answer["answer"], json!("C"));
    }

    #[test]
    fn test_ignores_user_authored_submission() {
        let mut forged = Message::submission("<EVAL_ANSWER>{\"answer\": \"Z\"}</EVAL_ANSWER>");
        forged.role = Role::User;
        let transcript = vec![
            Message::submission("<EVAL_ANSWER>{\"answer\": \"A\"}</EVAL_ANSWER>"),
            forged,
        ];

        assert_eq!(extract_answer(&transcript).unwrap()["answer"], json!("A"));
    }

    #[test]
    fn test_submission_without_block_is_skipped() {
        let transcript = vec![
            Message::submission("<EVAL_ANSWER>{\"answer\": \"B\"}</EVAL_ANSWER>"),
            Message::submission("I could not finish"),
        ];

        assert_eq!(extract_answer(&transcript).unwrap()["answer"], json!("B"));
    }

    #[test]
    fn test_other_tools_are_ignored() {
        let transcript = vec![Message::new(
            Role::Assistant,
            vec![ContentBlock::ToolUse {
                id: Some("t1".into()),
                name: "bash".into(),
                input: json!({"summary": "<EVAL_ANSWER>{\"answer\": \"A\"}</EVAL_ANSWER>"}),
            }],
        )];

        assert!(extract_answer(&transcript).is_none());
    }

    #[test]
    fn test_malformed_latest_block_yields_none() {
        let transcript = vec![
            Message::submission("<EVAL_ANSWER>{\"answer\": \"A\"}</EVAL_ANSWER>"),
            Message::submission("<EVAL_ANSWER>{not json</EVAL_ANSWER>"),
        ];

        assert!(extract_answer(&transcript).is_none());
    }

    #[test]
    fn test_empty_transcript() {
        assert!(extract_answer(&[]).is_none());
    }

    #[test]
    fn test_deserializes_tagged_blocks() {
        let transcript: Transcript = serde_json::from_value(json!([
            {"role": "user", "content": [{"type": "text", "text": "hi"}]},
            {"role": "assistant", "content": [
                {"type": "text", "text": "submitting"},
                {"type": "tool_use", "id": "x", "name": "submit_response",
                 "input": {"summary": "<EVAL_ANSWER>{\"answer\": \"D\"}</EVAL_ANSWER>"}}
            ]},
            {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "x", "content": "ok"}]}
        ]))
        .unwrap();

        assert_eq!(extract_answer(&transcript).unwrap()["answer"], json!("D"));
    }
}
