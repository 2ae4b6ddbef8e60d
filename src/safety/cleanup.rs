/// Best-effort filesystem cleanup
/// Cleanup never fails the request: every error is logged and swallowed.
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Names a previous run may have left directly in the shared temp root
pub fn is_stale_artifact_name(name: &str) -> bool {
    name.ends_with(".tri")
        || name.ends_with(".exe")
        || name.starts_with("temp_")
        || matches!(name, "privet" | "a.out" | "main")
}

/// Remove a directory tree. Returns true when the path is gone afterwards.
pub fn remove_tree_best_effort(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove directory {}: {}", path.display(), e);
            false
        }
    }
}

/// Delete stale artifact files from the shared temp root.
/// Only regular files are considered; workspace directories are left alone.
pub fn purge_stale_artifacts(root: &Path) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("Failed to list temp directory {} for cleanup: {}", root.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let name = entry.file_name();
        if !is_stale_artifact_name(&name.to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted stale artifact: {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete stale artifact {}: {}", path.display(), e),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_artifact_names() {
        assert!(is_stale_artifact_name("temp_ab12cd34.tri"));
        assert!(is_stale_artifact_name("temp_ab12cd34"));
        assert!(is_stale_artifact_name("hello.exe"));
        assert!(is_stale_artifact_name("privet"));
        assert!(is_stale_artifact_name("a.out"));
        assert!(is_stale_artifact_name("main"));
        assert!(!is_stale_artifact_name("tribox.json"));
        assert!(!is_stale_artifact_name("run_1234"));
    }

    #[test]
    fn test_purge_keeps_directories_and_unrelated_files() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("temp_1.tri"), "x").unwrap();
        fs::write(root.path().join("a.out"), "x").unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(root.path().join("temp_dir")).unwrap();

        assert_eq!(purge_stale_artifacts(root.path()), 2);
        assert!(root.path().join("notes.txt").exists());
        assert!(root.path().join("temp_dir").is_dir());
    }

    #[test]
    fn test_purge_missing_root() {
        assert_eq!(purge_stale_artifacts(Path::new("/nonexistent/tribox")), 0);
    }

    #[test]
    fn test_remove_tree_missing_path_is_success() {
        assert!(remove_tree_best_effort(Path::new("/nonexistent/tribox/tree")));
    }
}
