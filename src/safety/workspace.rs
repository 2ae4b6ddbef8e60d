/// Request-scoped workspaces
/// Each request owns one fresh directory under the temp root; no two
/// concurrent requests ever share a directory.

use crate::config::types::{PlaygroundError, Result};
use crate::safety::cleanup;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory name prefix for compile-and-run workspaces
pub const RUN_PREFIX: &str = "run_";
/// Directory name prefix for analysis workspaces
pub const SESSION_PREFIX: &str = "session_";

const KNOWN_PREFIXES: [&str; 2] = [RUN_PREFIX, SESSION_PREFIX];

/// Disposable directory holding one request's source file and artifacts
#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: PathBuf,
    source_file: Option<PathBuf>,
    disposed: bool,
}

impl Workspace {
    /// Create a fresh workspace directory `<base>/<prefix><uuid>`
    pub fn create(base_dir: &Path, prefix: &str) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let dir = base_dir.join(format!("{}{}", prefix, id));

        fs::create_dir_all(&dir).map_err(|e| {
            PlaygroundError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create workspace directory {}: {}", dir.display(), e),
            ))
        })?;
        log::debug!("Created workspace {}", dir.display());

        Ok(Self {
            id,
            dir,
            source_file: None,
            disposed: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the source file into the workspace
    pub fn write_source(&mut self, file_name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, content).map_err(|e| {
            PlaygroundError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write source file {}: {}", path.display(), e),
            ))
        })?;

        self.source_file = Some(path.clone());
        Ok(path)
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Recursively delete the workspace. Idempotent; failures are logged.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if cleanup::remove_tree_best_effort(&self.dir) {
            log::debug!("Disposed workspace {}", self.dir.display());
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Creates workspaces under one shared temp root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// The root is created lazily by the first workspace
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn create_workspace(&self, prefix: &str) -> Result<Workspace> {
        Workspace::create(&self.base_dir, prefix)
    }

    /// Remove workspace directories left behind by a crashed instance
    pub fn cleanup_old_workspaces(&self, max_age: std::time::Duration) -> Result<usize> {
        if !self.base_dir.exists() {
            return Ok(0);
        }

        let now = std::time::SystemTime::now();
        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            PlaygroundError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read workspace root {}: {}", self.base_dir.display(), e),
            ))
        })?;

        let mut cleaned = 0;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !KNOWN_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }

            let path = entry.path();
            let modified = match fs::symlink_metadata(&path).and_then(|m| {
                if m.is_dir() {
                    m.modified()
                } else {
                    Err(std::io::Error::other("not a directory"))
                }
            }) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let age = match now.duration_since(modified) {
                Ok(d) => d,
                Err(_) => continue, // Future timestamp, skip
            };

            if age >= max_age {
                log::info!("Removing stale workspace: {}", path.display());
                if cleanup::remove_tree_best_effort(&path) {
                    cleaned += 1;
                }
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_workspace_creation() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("ws"));

        let workspace = manager.create_workspace(RUN_PREFIX).unwrap();
        assert!(workspace.dir().exists());
        assert!(workspace
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(RUN_PREFIX));
    }

    #[test]
    fn test_workspaces_never_share_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let a = manager.create_workspace(SESSION_PREFIX).unwrap();
        let b = manager.create_workspace(SESSION_PREFIX).unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let mut workspace = manager.create_workspace(RUN_PREFIX).unwrap();
        let source = workspace.write_source("main.tri", "модуль x").unwrap();
        assert!(source.exists());

        workspace.dispose();
        assert!(!workspace.dir().exists());
        assert!(workspace.is_disposed());

        // Second disposal is a no-op
        workspace.dispose();
        assert!(!workspace.dir().exists());
    }

    #[test]
    fn test_drop_disposes() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let dir = {
            let workspace = manager.create_workspace(RUN_PREFIX).unwrap();
            workspace.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_old_workspaces_only_touches_known_prefixes() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let stale = root.path().join(format!("{}abandoned", RUN_PREFIX));
        let foreign = root.path().join("someone_else");
        fs::create_dir_all(&stale).unwrap();
        fs::create_dir_all(&foreign).unwrap();

        let cleaned = manager.cleanup_old_workspaces(Duration::ZERO).unwrap();
        assert_eq!(cleaned, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_cleanup_old_workspaces_missing_root() {
        let manager = WorkspaceManager::new(PathBuf::from("/nonexistent/tribox-root"));
        assert_eq!(manager.cleanup_old_workspaces(Duration::ZERO).unwrap(), 0);
    }
}
