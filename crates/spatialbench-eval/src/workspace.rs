//! Per-evaluation workspaces
//!
//! Each evaluation gets a fresh directory at `<root>/<run_id>/<eval_id>`.
//! Cached datasets are linked into it, never copied.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::EvalError;
use crate::tasks::is_single_component;

/// Errors raised while preparing or removing a workspace
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("Invalid workspace name '{0}': must be a single path component")]
    InvalidName(String),

    #[error("{action} {path:?}: {message}")]
    Io {
        action: &'static str,
        path: PathBuf,
        message: String,
    },
}

impl WorkspaceError {
    fn io(action: &'static str, path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl From<WorkspaceError> for EvalError {
    fn from(err: WorkspaceError) -> Self {
        EvalError::Workspace(err.to_string())
    }
}

/// Owned handle to a provisioned workspace.
///
/// Dropping the handle without [`WorkspaceManager::dispose`] still removes
/// the directory unless it was provisioned with `keep`.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    keep: bool,
    disposed: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    /// Path of a file directly inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.disposed || self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(workspace = ?self.path, "workspace removed on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(workspace = ?self.path, error = %e, "failed to remove workspace"),
        }
    }
}

/// Creates and removes evaluation workspaces under one root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<run_id>/<eval_id>`, or `<root>/<eval_id>` without a run id
    pub fn path_for(&self, eval_id: &str, run_id: Option<&str>) -> PathBuf {
        match run_id {
            Some(run_id) => self.root.join(run_id).join(eval_id),
            None => self.root.join(eval_id),
        }
    }

    /// Create an empty workspace, deleting whatever was there before
    pub async fn provision(
        &self,
        eval_id: &str,
        run_id: Option<&str>,
        keep: bool,
    ) -> Result<Workspace, WorkspaceError> {
        for name in std::iter::once(eval_id).chain(run_id) {
            if !is_single_component(name) {
                return Err(WorkspaceError::InvalidName(name.to_string()));
            }
        }

        let path = self.path_for(eval_id, run_id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => tracing::debug!(workspace = ?path, "removed stale workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::io("remove", &path, e)),
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| WorkspaceError::io("create", &path, e))?;

        tracing::debug!(workspace = ?path, eval_id = %eval_id, "workspace provisioned");
        Ok(Workspace {
            path,
            keep,
            disposed: false,
        })
    }

    /// Link a cached file into the workspace as `file_name`, replacing any
    /// existing entry of that name
    pub async fn stage(
        &self,
        workspace: &Workspace,
        source: &Path,
        file_name: &str,
    ) -> Result<PathBuf, WorkspaceError> {
        if !is_single_component(file_name) {
            return Err(WorkspaceError::InvalidName(file_name.to_string()));
        }

        let dest = workspace.path.join(file_name);
        if let Ok(meta) = tokio::fs::symlink_metadata(&dest).await {
            let removed = if meta.is_dir() {
                tokio::fs::remove_dir_all(&dest).await
            } else {
                tokio::fs::remove_file(&dest).await
            };
            removed.map_err(|e| WorkspaceError::io("replace", &dest, e))?;
        }

        let source =
            std::path::absolute(source).map_err(|e| WorkspaceError::io("resolve", source, e))?;
        link(&source, &dest)
            .await
            .map_err(|e| WorkspaceError::io("link", &dest, e))?;

        tracing::debug!(source = ?source, dest = ?dest, "dataset staged");
        Ok(dest)
    }

    /// Remove the workspace, or leave it in place when `keep` is set
    pub async fn dispose(&self, mut workspace: Workspace, keep: bool) -> Result<(), WorkspaceError> {
        workspace.disposed = true;
        if keep || workspace.keep {
            tracing::info!("Workspace kept at {}", workspace.path.display());
            return Ok(());
        }

        match tokio::fs::remove_dir_all(&workspace.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::io("remove", &workspace.path, e)),
        }
        tracing::info!("Workspace removed: {}", workspace.path.display());
        Ok(())
    }
}

#[cfg(unix)]
async fn link(source: &Path, dest: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(source, dest).await
}

#[cfg(not(unix))]
async fn link(source: &Path, dest: &Path) -> std::io::Result<()> {
    tokio::fs::copy(source, dest).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let first = manager.provision("qc_01", Some("20250101_000000"), true).await.unwrap();
        std::fs::write(first.file("leftover.txt"), "stale").unwrap();
        std::fs::create_dir_all(first.file("nested/deeper")).unwrap();
        let path = first.path().to_path_buf();
        drop(first);

        let second = manager.provision("qc_01", Some("20250101_000000"), false).await.unwrap();
        assert_eq!(second.path(), path);
        assert_eq!(std::fs::read_dir(second.path()).unwrap().count(), 0);
        assert_eq!(path, dir.path().join("20250101_000000").join("qc_01"));
    }

    #[tokio::test]
    async fn test_path_without_run_id() {
        let manager = WorkspaceManager::new("/ws");
        assert_eq!(manager.path_for("a", None), PathBuf::from("/ws/a"));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());
        let err = manager.provision("../escape", None, false).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName(_)));

        let err = manager.provision("ok", Some("a/b"), false).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_stage_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let cached = dir.path().join("abc__cells.h5ad");
        std::fs::write(&cached, "cached").unwrap();

        let manager = WorkspaceManager::new(dir.path().join("ws"));
        let workspace = manager.provision("e1", None, false).await.unwrap();
        std::fs::write(workspace.file("cells.h5ad"), "old").unwrap();

        let staged = manager.stage(&workspace, &cached, "cells.h5ad").await.unwrap();
        assert_eq!(std::fs::read_to_string(&staged).unwrap(), "cached");
        #[cfg(unix)]
        assert!(std::fs::symlink_metadata(&staged).unwrap().file_type().is_symlink());

        assert!(manager.stage(&workspace, &cached, "../x").await.is_err());
    }

    #[tokio::test]
    async fn test_dispose_removes_unless_kept() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let removed = manager.provision("gone", None, false).await.unwrap();
        let removed_path = removed.path().to_path_buf();
        manager.dispose(removed, false).await.unwrap();
        assert!(!removed_path.exists());

        let kept = manager.provision("kept", None, false).await.unwrap();
        let kept_path = kept.path().to_path_buf();
        manager.dispose(kept, true).await.unwrap();
        assert!(kept_path.exists());
    }

    #[tokio::test]
    async fn test_drop_cleans_up() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());
        let workspace = manager.provision("dropped", None, false).await.unwrap();
        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!path.exists());
    }
}
