//! Subprocess agent adapter
//!
//! Runs an agent CLI with the prompt on stdin and the workspace as its
//! working directory, then reads the answer file the agent wrote.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{AgentAdapter, AgentError, AgentOutcome};
use crate::round2;

/// Combined stdout/stderr log written into the workspace
pub const AGENT_LOG_FILE: &str = "agent_output.log";

/// Parsed stream-json events written into the workspace
pub const TRAJECTORY_FILE: &str = "trajectory.json";

const COMPLETION_NOTE: &str = "\n\nCRITICAL: You must write eval_answer.json BEFORE signaling completion.\nCorrect order: 1) Perform analysis 2) Write eval_answer.json with your answer 3) Exit";

const LOG_TAIL_CHARS: usize = 1000;
const FILE_PREVIEW_CHARS: usize = 500;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Short model names understood by the `claude` CLI
pub fn claude_model_alias(model: &str) -> &str {
    match model {
        "anthropic/claude-opus-4-5" => "opus",
        "anthropic/claude-sonnet-4-5" => "sonnet",
        "anthropic/claude-sonnet-4" => "claude-sonnet-4-20250514",
        "anthropic/claude-opus-4" => "claude-opus-4-20250514",
        "anthropic/claude-haiku-3-5" => "haiku",
        other => other,
    }
}

/// Agent adapter backed by an external command.
///
/// `{workspace}` and `{model}` in the arguments are substituted per call.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    name: String,
    program: String,
    args: Vec<String>,
    model: Option<String>,
    answer_filename: String,
    env: Vec<(String, String)>,
}

impl CommandAgent {
    /// Create from a full command line
    pub fn new(command: &[String]) -> Result<Self, AgentError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| AgentError::Invocation("agent command is empty".to_string()))?;
        let name = Path::new(program)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| program.clone());

        Ok(Self {
            name,
            program: program.clone(),
            args: args.to_vec(),
            model: None,
            answer_filename: "eval_answer.json".to_string(),
            env: Vec::new(),
        })
    }

    /// Adapter for the `claude` CLI in stream-json mode
    pub fn claude_code(model: Option<&str>) -> Self {
        let mut args: Vec<String> = [
            "--print",
            "--dangerously-skip-permissions",
            "--verbose",
            "--output-format",
            "stream-json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(model) = model {
            args.push("--model".to_string());
            args.push(claude_model_alias(model).to_string());
        }

        Self {
            name: "claudecode".to_string(),
            program: "claude".to_string(),
            args,
            model: model.map(str::to_string),
            answer_filename: "eval_answer.json".to_string(),
            env: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_answer_filename(mut self, filename: impl Into<String>) -> Self {
        self.answer_filename = filename.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn render_args(&self, workspace: &Path) -> Vec<String> {
        let workspace = workspace.to_string_lossy();
        let model = self.model.as_deref().unwrap_or("");
        self.args
            .iter()
            .map(|arg| arg.replace("{workspace}", &workspace).replace("{model}", model))
            .collect()
    }

    async fn collect_answer(
        &self,
        workspace: &Path,
        timed_out: bool,
        log: &str,
    ) -> (Option<Map<String, Value>>, Option<Value>) {
        let path = workspace.join(&self.answer_filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                let error = if timed_out {
                    "Agent timed out".to_string()
                } else if e.kind() == std::io::ErrorKind::NotFound {
                    format!("Agent did not create {}", self.answer_filename)
                } else {
                    format!("Failed to read {}: {}", self.answer_filename, e)
                };
                tracing::warn!("{}", error);
                return (
                    None,
                    Some(json!({
                        "error": error,
                        "timed_out": timed_out,
                        "log_tail": tail_chars(log, LOG_TAIL_CHARS),
                    })),
                );
            }
        };

        let parse_error = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(answer)) => return (Some(answer), None),
            Ok(_) => format!("{} is not a JSON object", self.answer_filename),
            Err(e) => format!("Failed to parse {}: {}", self.answer_filename, e),
        };
        tracing::warn!("{}", parse_error);
        (
            None,
            Some(json!({
                "error": parse_error,
                "file_contents": head_chars(&content, FILE_PREVIEW_CHARS),
            })),
        )
    }
}

#[async_trait]
impl AgentAdapter for CommandAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        prompt: &str,
        workspace: &Path,
        timeout: Duration,
    ) -> Result<AgentOutcome, AgentError> {
        let log_path = workspace.join(AGENT_LOG_FILE);
        let _ = tokio::fs::remove_file(&log_path).await;

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(self.render_args(workspace))
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Invocation(format!("Failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = format!("{}{}", prompt, COMPLETION_NOTE);
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!(error = %e, "agent closed stdin early");
                }
            });
        }

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (timed_out, exit_code) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => (false, status.code()),
            Ok(Err(e)) => {
                return Err(AgentError::Invocation(format!(
                    "Failed to wait for {}: {}",
                    self.program, e
                )));
            }
            Err(_) => {
                tracing::warn!(workspace = ?workspace, secs = timeout.as_secs(), "agent timed out, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill agent process");
                }
                (true, None)
            }
        };

        let (stdout, stderr) = tokio::join!(collect(stdout), collect(stderr));
        let duration = start.elapsed();

        let mut log = stdout.clone();
        if timed_out {
            log.push_str(&format!(
                "\n\nAgent timed out after {} seconds",
                timeout.as_secs()
            ));
        } else if !stderr.is_empty() {
            log.push_str(&format!("\n\nSTDERR:\n{}", stderr));
        }
        if let Err(e) = tokio::fs::write(&log_path, &log).await {
            tracing::warn!(error = %e, "failed to write agent log");
        }
        tracing::info!("Agent output saved to: {}", log_path.display());

        let (trajectory, result_event) = parse_stream(&stdout);
        if !trajectory.is_empty() {
            let trajectory_path = workspace.join(TRAJECTORY_FILE);
            match serde_json::to_string_pretty(&trajectory) {
                Ok(text) => {
                    if let Err(e) = tokio::fs::write(&trajectory_path, text).await {
                        tracing::warn!(error = %e, "failed to write trajectory");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize trajectory"),
            }
        }

        let (answer, error_details) = self.collect_answer(workspace, timed_out, &log).await;

        let mut metadata = Map::new();
        metadata.insert("duration_s".into(), json!(round2(duration.as_secs_f64())));
        metadata.insert("model".into(), json!(self.model));
        metadata.insert("exit_code".into(), json!(exit_code));
        if let Some(result) = result_event {
            metadata.insert("total_cost".into(), field(&result, "total_cost_usd"));
            metadata.insert("n_turns".into(), field(&result, "num_turns"));
            metadata.insert("session_id".into(), field(&result, "session_id"));
            metadata.insert("usage".into(), field(&result, "usage"));
        }
        if timed_out {
            metadata.insert("timed_out".into(), Value::Bool(true));
            metadata.insert("eval_timeout_seconds".into(), json!(timeout.as_secs()));
        }
        if let Some(details) = error_details {
            metadata.insert("error_details".into(), details);
        }

        Ok(AgentOutcome { answer, metadata })
    }
}

/// Output of one child pipe, readable even if the reader never reaches EOF
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

fn drain<R>(reader: Option<R>) -> Option<Drain>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut reader| {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let handle = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                }
            }
        });
        Drain { buf, handle }
    })
}

async fn collect(drain: Option<Drain>) -> String {
    let Some(Drain { buf, mut handle }) = drain else {
        return String::new();
    };
    // Orphaned grandchildren can keep a pipe open after the agent is killed.
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
        tracing::debug!("agent output pipe still open, keeping partial output");
        handle.abort();
    }
    let bytes = buf.lock().await;
    String::from_utf8_lossy(&bytes).to_string()
}

/// Stream-json events and the last `{"type": "result"}` event
fn parse_stream(stdout: &str) -> (Vec<Value>, Option<Value>) {
    let mut events = Vec::new();
    let mut result = None;
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Ok(event) = serde_json::from_str::<Value>(line) {
            if event.get("type").and_then(Value::as_str) == Some("result") {
                result = Some(event.clone());
            }
            events.push(event);
        }
    }
    (events, result)
}

fn field(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &s[idx..],
        _ if n == 0 => "",
        _ => s,
    }
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandAgent {
        CommandAgent::new(&["sh".to_string(), "-c".to_string(), script.to_string()])
            .unwrap()
            .with_name("test-agent")
    }

    #[test]
    fn test_model_alias() {
        assert_eq!(claude_model_alias("anthropic/claude-sonnet-4-5"), "sonnet");
        assert_eq!(claude_model_alias("custom-model"), "custom-model");
    }

    #[test]
    fn test_claude_code_args() {
        let agent = CommandAgent::claude_code(Some("anthropic/claude-opus-4-5"));
        assert_eq!(agent.name(), "claudecode");
        let args = agent.render_args(Path::new("/ws"));
        assert_eq!(&args[args.len() - 2..], ["--model", "opus"]);
    }

    #[test]
    fn test_placeholders() {
        let agent = CommandAgent::new(&[
            "run-agent".to_string(),
            "--dir={workspace}".to_string(),
            "--model".to_string(),
            "{model}".to_string(),
        ])
        .unwrap()
        .with_model("m1");
        assert_eq!(
            agent.render_args(Path::new("/tmp/ws")),
            vec!["--dir=/tmp/ws", "--model", "m1"]
        );
    }

    #[test]
    fn test_char_helpers() {
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("ab", 10), "ab");
        assert_eq!(tail_chars("ab", 0), "");
        assert_eq!(head_chars("héllo", 2), "hé");
        assert_eq!(head_chars("hi", 10), "hi");
    }

    #[test]
    fn test_parse_stream_picks_result_event() {
        let stdout = "{\"type\":\"system\"}\nnot json\n{\"type\":\"result\",\"total_cost_usd\":0.42,\"num_turns\":7}\n";
        let (events, result) = parse_stream(stdout);
        assert_eq!(events.len(), 2);
        assert_eq!(result.unwrap()["num_turns"], 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_reads_answer_and_cost() {
        let dir = TempDir::new().unwrap();
        let agent = sh(
            "cat > prompt.txt; echo '{\"type\":\"result\",\"total_cost_usd\":0.5,\"num_turns\":3,\"session_id\":\"s1\"}'; echo '{\"answer\": \"B\"}' > eval_answer.json",
        );

        let outcome = agent
            .invoke("Pick one", dir.path(), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome.answer.as_ref().unwrap()["answer"], "B");
        assert_eq!(outcome.metadata["total_cost"], json!(0.5));
        assert_eq!(outcome.metadata["n_turns"], json!(3));
        assert!(!outcome.timed_out());
        assert!(dir.path().join(TRAJECTORY_FILE).exists());

        let prompt = std::fs::read_to_string(dir.path().join("prompt.txt")).unwrap();
        assert!(prompt.starts_with("Pick one"));
        assert!(prompt.contains("CRITICAL"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_missing_answer() {
        let dir = TempDir::new().unwrap();
        let agent = sh("echo working; echo oops >&2");

        let outcome = agent
            .invoke("task", dir.path(), Duration::from_secs(30))
            .await
            .unwrap();

        assert!(outcome.answer.is_none());
        let details = &outcome.metadata["error_details"];
        assert_eq!(details["error"], "Agent did not create eval_answer.json");
        assert_eq!(details["timed_out"], false);

        let log = std::fs::read_to_string(dir.path().join(AGENT_LOG_FILE)).unwrap();
        assert!(log.contains("working"));
        assert!(log.contains("STDERR:\noops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_malformed_answer() {
        let dir = TempDir::new().unwrap();
        let agent = sh("echo '{not json' > eval_answer.json");

        let outcome = agent
            .invoke("task", dir.path(), Duration::from_secs(30))
            .await
            .unwrap();

        assert!(outcome.answer.is_none());
        let details = &outcome.metadata["error_details"];
        assert!(details["error"].as_str().unwrap().starts_with("Failed to parse eval_answer.json"));
        assert_eq!(details["file_contents"], "{not json\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_timeout_kills_agent() {
        let dir = TempDir::new().unwrap();
        let agent = sh("echo started; exec sleep 30");

        let started = Instant::now();
        let outcome = agent
            .invoke("task", dir.path(), Duration::from_millis(300))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(outcome.timed_out());
        assert_eq!(outcome.metadata["eval_timeout_seconds"], json!(0));
        assert_eq!(outcome.metadata["error_details"]["error"], "Agent timed out");

        let log = std::fs::read_to_string(dir.path().join(AGENT_LOG_FILE)).unwrap();
        assert!(log.starts_with("started"));
        assert!(log.contains("Agent timed out after"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_keeps_output_when_pipe_stays_open() {
        let dir = TempDir::new().unwrap();
        // The backgrounded sleep inherits stdout and outlives the killed agent.
        let agent = sh("echo partial-marker; sleep 30 & exec sleep 30");

        let outcome = agent
            .invoke("task", dir.path(), Duration::from_millis(300))
            .await
            .unwrap();

        assert!(outcome.timed_out());
        let log = std::fs::read_to_string(dir.path().join(AGENT_LOG_FILE)).unwrap();
        assert!(log.contains("partial-marker"));
        assert!(log.contains("Agent timed out after"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_invocation_error() {
        let dir = TempDir::new().unwrap();
        let agent = CommandAgent::new(&["/nonexistent/agent-binary".to_string()]).unwrap();
        let err = agent
            .invoke("task", dir.path(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Invocation(_)));
    }
}
