//! Markdown report generation

use anyhow::Result;

use super::status_label;
use crate::summary::BatchSummary;

/// Markdown report generator
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// Generate a Markdown report
    pub fn generate(summary: &BatchSummary) -> Result<String> {
        let m = &summary.metadata;
        let mut md = String::new();

        md.push_str("# SpatialBench Evaluation Report\n\n");

        md.push_str("## Overview\n\n");
        md.push_str(&format!("- **Model**: {}\n", m.model));
        if let Some(run_id) = &m.run_id {
            md.push_str(&format!("- **Run**: {}\n", run_id));
        }
        md.push_str(&format!(
            "- **Timestamp**: {}\n\n",
            m.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        md.push_str(&format!("| Total | {} |\n", m.total_evals));
        md.push_str(&format!("| Passed | {} |\n", m.passed));
        md.push_str(&format!("| Failed | {} |\n", m.failed));
        md.push_str(&format!("| Errors | {} |\n", m.errors));
        md.push_str(&format!("| Pass Rate | {:.1}% |\n", m.pass_rate));
        md.push_str(&format!("| Avg Duration | {:.1}s |\n", m.avg_duration_s));
        md.push_str(&format!("| Total Duration | {:.1}s |\n", m.total_duration_s));
        if let Some(cost) = m.total_cost {
            md.push_str(&format!("| Total Cost | ${:.4} |\n", cost));
        }
        if let Some(steps) = m.avg_steps_per_eval {
            md.push_str(&format!("| Avg Steps | {:.1} |\n", steps));
        }
        md.push('\n');

        md.push_str("## Results\n\n");
        md.push_str("| Eval | Status | Duration | Errors |\n");
        md.push_str("|------|--------|----------|--------|\n");
        for record in &summary.results {
            let errors: Vec<String> = record.errors().into_iter().map(|e| e.code).collect();
            md.push_str(&format!(
                "| {} | {} | {:.1}s | {} |\n",
                record.eval_id,
                status_label(record),
                record.duration_s().unwrap_or(0.0),
                errors.join(", ")
            ));
        }

        let failures: Vec<_> = summary
            .results
            .iter()
            .filter(|r| r.passed == Some(false))
            .filter_map(|r| r.grader_result.as_ref().map(|g| (&r.eval_id, g)))
            .collect();
        if !failures.is_empty() {
            md.push_str("\n## Failed Evaluations\n\n");
            for (eval_id, result) in failures {
                md.push_str(&format!("### {}\n\n```\n{}\n```\n\n", eval_id, result.reasoning));
            }
        }

        Ok(md)
    }
}
