//! Task listing

use std::path::Path;

use anyhow::Result;
use colored::*;
use spatialbench_eval::TaskLoader;

/// List the task specs under `dir`, grouped by category
pub fn execute(dir: &Path) -> Result<()> {
    let groups = TaskLoader::new(dir).group_by_category()?;
    if groups.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("Available evaluation tasks:\n");
    println!("{:<40} {:<30} {:>8}", "ID", "Grader", "Datasets");
    println!("{:-<80}", "");

    let mut total = 0;
    for (category, specs) in &groups {
        println!("{}", category.bold());
        for (_, spec) in specs {
            let grader = spec
                .grader
                .as_ref()
                .map(|g| g.grader_type.clone())
                .unwrap_or_else(|| "-".to_string());
            let id = if spec.id.chars().count() > 38 {
                let head: String = spec.id.chars().take(35).collect();
                format!("{}...", head)
            } else {
                spec.id.clone()
            };
            println!("  {:<38} {:<30} {:>8}", id, grader, spec.data_refs().len());
        }
        total += specs.len();
    }

    println!("\nTotal: {} tasks", total);
    println!("\nBy category:");
    for (category, specs) in &groups {
        println!("  {}: {}", category, specs.len());
    }
    Ok(())
}
