//! Task spec validation

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use spatialbench_eval::TaskLoader;
use spatialbench_eval::tasks::load_task_file;
use spatialbench_graders::GraderRegistry;

use crate::console;

/// Validate every spec under `paths`
pub fn execute(paths: &[PathBuf]) -> Result<()> {
    let registry = GraderRegistry::builtin();
    let mut checked = 0;
    let mut invalid = 0;

    for path in paths {
        for file in TaskLoader::new(path).discover()? {
            checked += 1;
            match check(&file, &registry) {
                Ok(id) => console::success(&format!("{} ({})", id, file.display())),
                Err(message) => {
                    invalid += 1;
                    console::error(&format!("{}: {}", file.display(), message));
                }
            }
        }
    }

    if invalid > 0 {
        bail!("{} of {} task specs are invalid", invalid, checked);
    }
    println!("\n{} task specs are valid", checked);
    Ok(())
}

/// Required fields plus a registered grader type
fn check(path: &Path, registry: &GraderRegistry) -> Result<String, String> {
    let spec = load_task_file(path).map_err(|e| e.to_string())?;
    if let Some(grader) = &spec.grader {
        if !registry.supports(&grader.grader_type) {
            return Err(format!("unknown grader type '{}'", grader.grader_type));
        }
    }
    Ok(spec.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_grader_is_invalid() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        std::fs::write(
            &good,
            json!({"id": "good", "task": "Count cells",
                   "grader": {"type": "numeric_tolerance", "config": {}}})
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            &bad,
            json!({"id": "bad", "task": "Count cells",
                   "grader": {"type": "vibes", "config": {}}})
            .to_string(),
        )
        .unwrap();

        let registry = GraderRegistry::builtin();
        assert_eq!(check(&good, &registry).unwrap(), "good");
        assert!(check(&bad, &registry).unwrap_err().contains("vibes"));
        assert!(execute(&[dir.path().to_path_buf()]).is_err());
        assert!(execute(&[good]).is_ok());
    }
}
