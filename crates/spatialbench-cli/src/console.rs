//! CLI console utilities

use colored::*;
use spatialbench_eval::EvalResultRecord;
use spatialbench_eval::report::status_label;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print a header
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!("{}", "=".repeat(title.len()).dimmed());
}

/// Colored status label of a record
pub fn status(record: &EvalResultRecord) -> ColoredString {
    let label = status_label(record);
    match label {
        "PASS" => label.green().bold(),
        "FAIL" => label.red().bold(),
        "ERROR" => label.red(),
        _ => label.yellow(),
    }
}

/// Print a finished evaluation with its reasoning and errors
pub fn print_record(record: &EvalResultRecord) {
    print_header(&format!("Evaluation: {}", record.eval_id));
    println!("{:<12} {}", "Status:", status(record));
    if let Some(duration) = record.duration_s() {
        println!("{:<12} {:.1}s", "Duration:", duration);
    }
    if let Some(cost) = record.cost() {
        println!("{:<12} ${:.4}", "Cost:", cost);
    }
    if let Some(workspace) = record.metadata.get("workspace").and_then(|v| v.as_str()) {
        println!("{:<12} {}", "Workspace:", workspace.dimmed());
    }

    if let Some(result) = &record.grader_result {
        println!();
        println!("{}", result.reasoning);
    }

    for entry in record.errors() {
        error(&format!("{}: {}", entry.code, entry.message));
    }
}
