//! Task spec discovery and loading

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::TaskSpec;
use crate::error::{EvalError, HarnessResult};

/// Loader for task spec files under a directory
pub struct TaskLoader {
    /// Base directory for task specs
    tasks_dir: PathBuf,
}

impl TaskLoader {
    /// Create a new task loader with the given directory
    pub fn new(tasks_dir: impl AsRef<Path>) -> Self {
        Self {
            tasks_dir: tasks_dir.as_ref().to_path_buf(),
        }
    }

    /// Base directory
    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// All `*.json` spec files under the directory, sorted by path
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.tasks_dir.exists() {
            anyhow::bail!("Task directory not found: {:?}", self.tasks_dir);
        }
        if self.tasks_dir.is_file() {
            return Ok(vec![self.tasks_dir.clone()]);
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.tasks_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| Self::is_task_file(p))
            .collect();
        paths.sort();

        Ok(paths)
    }

    /// Load every spec that parses, logging and skipping the rest
    pub fn load_all(&self) -> Result<Vec<(PathBuf, TaskSpec)>> {
        let mut specs = Vec::new();
        for path in self.discover()? {
            match load_task_file(&path) {
                Ok(spec) => specs.push((path, spec)),
                Err(e) => {
                    tracing::warn!("Failed to load task from {:?}: {}", path, e);
                }
            }
        }
        Ok(specs)
    }

    /// Load a single spec by id
    pub fn load_by_id(&self, id: &str) -> Result<Option<TaskSpec>> {
        Ok(self
            .load_all()?
            .into_iter()
            .map(|(_, spec)| spec)
            .find(|spec| spec.id == id))
    }

    /// Spec files grouped by their first directory level (e.g. `qc`, `clustering`)
    pub fn group_by_category(&self) -> Result<Vec<(String, Vec<(PathBuf, TaskSpec)>)>> {
        let mut groups: std::collections::BTreeMap<String, Vec<(PathBuf, TaskSpec)>> =
            std::collections::BTreeMap::new();

        for (path, spec) in self.load_all()? {
            let category = path
                .strip_prefix(&self.tasks_dir)
                .ok()
                .and_then(|rel| {
                    let mut components = rel.components();
                    let first = components.next()?;
                    components.next()?;
                    Some(first.as_os_str().to_string_lossy().to_string())
                })
                .unwrap_or_else(|| "uncategorized".to_string());
            groups.entry(category).or_default().push((path, spec));
        }

        Ok(groups.into_iter().collect())
    }

    fn is_task_file(path: &Path) -> bool {
        path.is_file() && path.extension().is_some_and(|ext| ext == "json")
    }
}

/// Read, parse and validate one task spec file
pub fn load_task_file(path: &Path) -> HarnessResult<TaskSpec> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EvalError::InvalidTaskSpec(format!("Failed to read {:?}: {}", path, e)))?;
    TaskSpec::from_json(&content).map_err(|e| match e {
        EvalError::InvalidTaskSpec(msg) => {
            EvalError::InvalidTaskSpec(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Load a task spec from a file, with anyhow context for CLI callers
pub fn read_task_spec(path: &Path) -> Result<TaskSpec> {
    load_task_file(path).with_context(|| format!("Failed to load task spec: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_recurses_and_sorts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "qc/b.json", r#"{"id": "b", "task": "t"}"#);
        write(dir.path(), "clustering/a.json", r#"{"id": "a", "task": "t"}"#);
        write(dir.path(), "README.md", "# notes");

        let loader = TaskLoader::new(dir.path());
        let paths = loader.discover().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("clustering/a.json"));
    }

    #[test]
    fn test_load_all_skips_invalid() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.json", r#"{"id": "ok", "task": "t"}"#);
        write(dir.path(), "broken.json", "{ not json");

        let loader = TaskLoader::new(dir.path());
        let specs = loader.load_all().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].1.id, "ok");
        assert_eq!(loader.load_by_id("ok").unwrap().unwrap().task, "t");
    }

    #[test]
    fn test_group_by_category() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "qc/a.json", r#"{"id": "a", "task": "t"}"#);
        write(dir.path(), "qc/b.json", r#"{"id": "b", "task": "t"}"#);
        write(dir.path(), "top.json", r#"{"id": "c", "task": "t"}"#);

        let groups = TaskLoader::new(dir.path()).group_by_category().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "qc");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "uncategorized");
    }

    #[test]
    fn test_load_task_file_reports_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.json", r#"{"task": "t"}"#);

        let err = load_task_file(&dir.path().join("bad.json")).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_single_file_discovery() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "one.json", r#"{"id": "one", "task": "t"}"#);
        let paths = TaskLoader::new(dir.path().join("one.json")).discover().unwrap();
        assert_eq!(paths.len(), 1);
    }
}
