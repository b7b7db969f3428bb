//! Offline grading of a saved answer or transcript

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use colored::*;
use serde_json::Value;
use spatialbench_eval::tasks::read_task_spec;
use spatialbench_graders::{GradeOutcome, GraderRegistry, GraderResult, Transcript};

/// Grade `answer` or `transcript` with the grader of `spec`
pub fn execute(spec: &Path, answer: Option<&Path>, transcript: Option<&Path>) -> Result<()> {
    let outcome = grade(spec, answer, transcript)?;

    if let Some(message) = outcome.error_message() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    }
    let result = outcome.into_result();
    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!("{}", verdict(&result));
    Ok(())
}

fn grade(spec: &Path, answer: Option<&Path>, transcript: Option<&Path>) -> Result<GradeOutcome> {
    let task = read_task_spec(spec)?;
    let grader = task
        .grader
        .as_ref()
        .ok_or_else(|| anyhow!("Task '{}' has no grader configured", task.id))?;
    let registry = GraderRegistry::builtin();

    match (answer, transcript) {
        (Some(path), _) => {
            let value: Value = read_json(path)?;
            let Value::Object(answer) = value else {
                return Err(anyhow!("Answer in {:?} is not a JSON object", path));
            };
            Ok(registry.grade_answer(grader, &answer))
        }
        (None, Some(path)) => {
            let transcript: Transcript = read_json(path)?;
            Ok(registry.grade_transcript(grader, &transcript))
        }
        (None, None) => Err(anyhow!("Either --answer or --transcript is required")),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn verdict(result: &GraderResult) -> ColoredString {
    match result.passed {
        Some(true) => "PASS".green().bold(),
        Some(false) => "FAIL".red().bold(),
        None => "UNGRADED".yellow(),
    }
}
