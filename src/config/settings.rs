/// Compiler service configuration loaded from tribox.json
use crate::config::types::{PlaygroundError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "tribox.json";

/// Settings consumed by the compile and analysis pipelines.
///
/// The first six fields are the externally supplied contract; the rest tune
/// process supervision and default to production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub compiler_path: PathBuf,
    pub temp_directory: PathBuf,
    pub compilation_timeout_ms: u64,
    pub execution_timeout_ms: u64,
    pub max_source_length: usize,
    pub max_output_length: usize,
    /// Flags passed before the source file in plain compile mode
    #[serde(default)]
    pub compile_flags: Vec<String>,
    /// Flags passed before the source file in AST dump mode
    #[serde(default = "default_ast_flags")]
    pub ast_flags: Vec<String>,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Running processes younger than this survive a sweep (0 = kill all ambiguous)
    #[serde(default)]
    pub sweep_min_age_ms: u64,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,
    #[serde(default = "default_stale_workspace_age_secs")]
    pub stale_workspace_age_secs: u64,
}

fn default_ast_flags() -> Vec<String> {
    vec!["-ast".to_string(), "2".to_string()]
}

fn default_sweep_interval_secs() -> u64 {
    120
}

fn default_kill_grace_ms() -> u64 {
    2_000
}

fn default_drain_grace_ms() -> u64 {
    5_000
}

fn default_max_capture_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_stale_workspace_age_secs() -> u64 {
    3_600
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            compiler_path: PathBuf::from("/app/compiler/v0.79/trivil"),
            temp_directory: PathBuf::from("/app/temp"),
            compilation_timeout_ms: 300_000,
            execution_timeout_ms: 10_000,
            max_source_length: 10_000,
            max_output_length: 50_000,
            compile_flags: Vec::new(),
            ast_flags: default_ast_flags(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_min_age_ms: 0,
            kill_grace_ms: default_kill_grace_ms(),
            drain_grace_ms: default_drain_grace_ms(),
            max_capture_bytes: default_max_capture_bytes(),
            stale_workspace_age_secs: default_stale_workspace_age_secs(),
        }
    }
}

impl CompilerSettings {
    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlaygroundError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| PlaygroundError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Load ./tribox.json when present, otherwise built-in defaults
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| PlaygroundError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            log::info!("Loading settings from {}", config_path.display());
            Self::load_from_file(config_path)
        } else {
            log::debug!("{} not found, using default settings", DEFAULT_CONFIG_FILE);
            Ok(Self::default())
        }
    }

    /// Override selected fields from TRIVIL_* environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("TRIVIL_COMPILER_PATH") {
            self.compiler_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("TRIVIL_TEMP_DIRECTORY") {
            self.temp_directory = PathBuf::from(dir);
        }
        if let Some(ms) = env_millis("TRIVIL_COMPILATION_TIMEOUT_MS")? {
            self.compilation_timeout_ms = ms;
        }
        if let Some(ms) = env_millis("TRIVIL_EXECUTION_TIMEOUT_MS")? {
            self.execution_timeout_ms = ms;
        }
        Ok(())
    }

    /// Reject blank paths and non-positive limits
    pub fn validate(&self) -> Result<()> {
        if self.compiler_path.as_os_str().is_empty() {
            return Err(PlaygroundError::Config("compiler_path must not be blank".to_string()));
        }
        if self.temp_directory.as_os_str().is_empty() {
            return Err(PlaygroundError::Config("temp_directory must not be blank".to_string()));
        }

        let positive = [
            ("compilation_timeout_ms", self.compilation_timeout_ms),
            ("execution_timeout_ms", self.execution_timeout_ms),
            ("max_source_length", self.max_source_length as u64),
            ("max_output_length", self.max_output_length as u64),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(PlaygroundError::Config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn compilation_timeout(&self) -> Duration {
        Duration::from_millis(self.compilation_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_min_age(&self) -> Duration {
        Duration::from_millis(self.sweep_min_age_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn stale_workspace_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_age_secs)
    }
}

fn env_millis(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| PlaygroundError::Config(format!("{} is not a millisecond count: {}", name, e))),
        Err(_) => Ok(None),
    }
}
