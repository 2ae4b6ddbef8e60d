/// Compiler success heuristic and executable discovery
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Printed by the Trivil compiler after a clean build
pub const SUCCESS_MARKER: &str = "Без ошибок";

/// Fixed output names older compiler builds produce
pub const LEGACY_EXECUTABLES: [&str; 2] = ["privet", "privet.exe"];

pub const DEFAULT_EXECUTABLE: &str = "a.out";

pub const SOURCE_EXTENSION: &str = ".tri";

/// Names probed in order after a successful compile
pub fn candidate_names(base_name: &str) -> Vec<String> {
    let mut names = vec![base_name.to_string(), format!("{}.exe", base_name)];
    names.extend(LEGACY_EXECUTABLES.iter().map(|name| name.to_string()));
    names.push(DEFAULT_EXECUTABLE.to_string());
    names
}

/// Exit code zero and either the success marker or a produced artifact.
///
/// The compiler does not signal success consistently, so neither condition
/// alone is trusted.
pub fn compilation_succeeded(exit_code: Option<i32>, output: &str, artifact_present: bool) -> bool {
    exit_code == Some(0) && (output.contains(SUCCESS_MARKER) || artifact_present)
}

/// First conventionally named artifact present in `dir`
pub fn probe_executable(dir: &Path, base_name: &str) -> Option<PathBuf> {
    candidate_names(base_name)
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Whether a file found by scanning could be the compiled program
pub fn is_plausible_executable_name(name: &str, source_name: &str) -> bool {
    if name == source_name || name.starts_with('.') {
        return false;
    }
    name.ends_with(".exe") || (!name.contains('.') && !name.starts_with('_'))
}

#[cfg(unix)]
fn is_runnable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_runnable(_metadata: &fs::Metadata) -> bool {
    true
}

/// Scan `dir` for any plausible executable, in name order
pub fn scan_for_executable(dir: &Path, source_name: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to scan {} for executables: {}", dir.display(), e);
            return None;
        }
    };

    let mut candidates: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_plausible_executable_name(&name, source_name) {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            (metadata.is_file() && is_runnable(&metadata)).then(|| (name, entry.path()))
        })
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    let found = candidates.into_iter().next().map(|(_, path)| path);
    if let Some(path) = &found {
        debug!("Found executable by scanning: {}", path.display());
    }
    found
}

/// Probe the conventional names, then fall back to a directory scan
pub fn locate_executable(dir: &Path, base_name: &str, source_name: &str) -> Option<PathBuf> {
    probe_executable(dir, base_name).or_else(|| scan_for_executable(dir, source_name))
}

/// Names of everything in `dir`, for diagnostics
pub fn list_dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
