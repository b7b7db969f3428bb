//! Reports over stored batch results

use std::path::Path;

use anyhow::{Result, anyhow};
use spatialbench_eval::report::{ModelComparison, ReportFormat, generate_report};
use spatialbench_eval::summary::BatchSummary;

use crate::console;

/// Show a report for a previous batch
pub fn show(input: &Path, format: &str) -> Result<()> {
    let format: ReportFormat = format.parse().map_err(|e: String| anyhow!(e))?;
    let summary = BatchSummary::load(input)?;
    println!("{}", generate_report(&summary, format)?);
    Ok(())
}

/// Compare the batch results of several models
pub fn compare(dir: &Path) -> Result<()> {
    let comparison = ModelComparison::load(dir)?;
    if comparison.models.is_empty() {
        console::warn(&format!("No batch results found under {}", dir.display()));
        return Ok(());
    }

    println!("{}", comparison.render());
    let path = comparison.write(dir)?;
    console::success(&format!("Comparison saved to {}", path.display()));
    Ok(())
}
