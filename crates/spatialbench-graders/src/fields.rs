//! Shared helpers for reading configs and answer fields

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{AgentAnswer, GraderError};

/// Deserialize a grader config, treating `null` as the default config
pub(crate) fn parse_config<T: DeserializeOwned + Default>(config: &Value) -> Result<T, GraderError> {
    if config.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(config.clone())?)
}

/// Read a numeric value, rejecting anything that is not a JSON number
pub(crate) fn as_number(value: &Value, field: &str) -> Result<f64, GraderError> {
    value
        .as_f64()
        .ok_or_else(|| GraderError::invalid_field(field, "a number"))
}

/// Read a required numeric answer field that is known to be present
pub(crate) fn number_field(answer: &AgentAnswer, field: &str) -> Result<f64, GraderError> {
    match answer.get(field) {
        Some(value) => as_number(value, field),
        None => Err(GraderError::invalid_field(field, "a number")),
    }
}

/// Read a list of strings
pub(crate) fn string_list(value: &Value, field: &str) -> Result<Vec<String>, GraderError> {
    let items = value
        .as_array()
        .ok_or_else(|| GraderError::invalid_field(field, "a list of strings"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| GraderError::invalid_field(field, "a list of strings"))
        })
        .collect()
}

/// Check mark for a reasoning line
pub(crate) fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

/// Verdict word for headers and result lines
pub(crate) fn verdict(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

/// Render a sorted label list the way reasoning blocks show it: `["a", "b"]`
pub(crate) fn quoted_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let quoted: Vec<String> = items.into_iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", quoted.join(", "))
}
