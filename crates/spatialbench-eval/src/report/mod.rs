//! Report generation for batch results
//!
//! Renders a batch summary as JSON, Markdown or a terminal table, and
//! compares summaries produced by different models.

mod compare;
mod markdown;

pub use compare::{COMPARISON_FILE, Disagreement, ModelComparison, ModelStats};
pub use markdown::MarkdownReporter;

use anyhow::Result;

use crate::runner::EvalResultRecord;
use crate::summary::BatchSummary;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    Table,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "table" => Ok(ReportFormat::Table),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Generate a report in the specified format
pub fn generate_report(summary: &BatchSummary, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        ReportFormat::Markdown => MarkdownReporter::generate(summary),
        ReportFormat::Table => Ok(generate_table(summary)),
    }
}

/// Status label of a record
pub fn status_label(record: &EvalResultRecord) -> &'static str {
    match record.passed {
        Some(true) => "PASS",
        Some(false) => "FAIL",
        None if record.errors().is_empty() => "UNGRADED",
        None => "ERROR",
    }
}

/// Plain-text table for terminal output
fn generate_table(summary: &BatchSummary) -> String {
    let m = &summary.metadata;
    let mut output = String::new();

    output.push_str(&format!("\n{:=<80}\n", "= SpatialBench Results "));
    output.push_str(&format!(
        "Model: {} | Run: {}\n",
        m.model,
        m.run_id.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "Timestamp: {}\n",
        m.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("{:=<80}\n\n", ""));

    output.push_str("SUMMARY\n");
    output.push_str(&format!("{:-<80}\n", ""));
    output.push_str(&format!(
        "Passed: {}/{} ({:.1}%)  Failed: {}  Errors: {}\n",
        m.passed, m.total_evals, m.pass_rate, m.failed, m.errors
    ));
    output.push_str(&format!(
        "Total Time: {:.1}s  Avg Time: {:.1}s\n",
        m.total_duration_s, m.avg_duration_s
    ));
    if let (Some(total), Some(avg)) = (m.total_cost, m.avg_cost_per_eval) {
        output.push_str(&format!("Cost: ${:.4} total, ${:.4} per eval\n", total, avg));
    }
    if let (Some(total), Some(avg)) = (m.total_steps, m.avg_steps_per_eval) {
        output.push_str(&format!("Steps: {} total, {:.1} per eval\n", total, avg));
    }
    output.push('\n');

    output.push_str("RESULTS\n");
    output.push_str(&format!("{:-<80}\n", ""));
    output.push_str(&format!(
        "{:<40} {:>10} {:>10}  {}\n",
        "Eval", "Status", "Time", "Error"
    ));
    output.push_str(&format!("{:-<80}\n", ""));

    for record in &summary.results {
        let eval_id = if record.eval_id.chars().count() > 38 {
            let head: String = record.eval_id.chars().take(35).collect();
            format!("{}...", head)
        } else {
            record.eval_id.clone()
        };
        let error = record
            .errors()
            .first()
            .map(|e| e.code.clone())
            .unwrap_or_default();
        output.push_str(&format!(
            "{:<40} {:>10} {:>9.1}s  {}\n",
            eval_id,
            status_label(record),
            record.duration_s().unwrap_or(0.0),
            error
        ));
    }

    output.push_str(&format!("{:=<80}\n", ""));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorEntry;
    use crate::summary::SummaryAggregator;

    pub(super) fn sample_summary() -> BatchSummary {
        let mut passed = EvalResultRecord::new("xenium_qc_cell_count");
        passed.passed = Some(true);
        passed.metadata.insert("duration_s".into(), 12.5.into());
        passed.metadata.insert("total_cost".into(), 0.3.into());

        let mut failed = EvalResultRecord::new("merfish_cell_typing");
        failed.passed = Some(false);

        let mut errored = EvalResultRecord::new("visium_de_markers");
        errored.push_error(ErrorEntry::new("data_staging", "403"));

        SummaryAggregator::new("anthropic/claude-sonnet-4")
            .with_run_id("20250101_120000")
            .aggregate(vec![passed, failed, errored])
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("TABLE".parse::<ReportFormat>().unwrap(), ReportFormat::Table);
        assert!("html".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_table_lists_every_record() {
        let table = generate_report(&sample_summary(), ReportFormat::Table).unwrap();
        assert!(table.contains("Passed: 1/3 (33.3%)"));
        assert!(table.contains("xenium_qc_cell_count"));
        assert!(table.contains("ERROR"));
        assert!(table.contains("data_staging"));
        assert!(table.contains("Cost: $0.3000 total"));
    }

    #[test]
    fn test_json_report_parses_back() {
        let summary = sample_summary();
        let json = generate_report(&summary, ReportFormat::Json).unwrap();
        let parsed: BatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results.len(), 3);
    }
}
