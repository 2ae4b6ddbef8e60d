/// Top-level playground service
/// Owns the process registry shared by both pipelines, the periodic sweeper
/// and the start-up/shutdown housekeeping around them.
use crate::analysis::analyzer::{AnalysisResponse, SourceAnalyzer};
use crate::config::settings::CompilerSettings;
use crate::config::types::{CompileOutcome, CompileResponse, Result};
use crate::exec::orphans;
use crate::exec::registry::ProcessRegistry;
use crate::exec::runner::{ProcessRunner, RunnerLimits};
use crate::exec::sweeper::ProcessSweeper;
use crate::judge::coordinator::CompileExecuteCoordinator;
use crate::safety::workspace::WorkspaceManager;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What `check-compiler` reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerStatus {
    pub compiler_path: PathBuf,
    pub exists: bool,
    pub executable: bool,
    pub temp_directory: PathBuf,
}

impl CompilerStatus {
    pub fn is_ready(&self) -> bool {
        self.exists && self.executable
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub struct Playground {
    settings: CompilerSettings,
    registry: Arc<ProcessRegistry>,
    coordinator: CompileExecuteCoordinator,
    analyzer: SourceAnalyzer,
    sweeper: ProcessSweeper,
}

impl Playground {
    pub fn new(settings: CompilerSettings) -> Result<Self> {
        settings.validate()?;

        let registry = Arc::new(ProcessRegistry::new(settings.kill_grace()));
        let runner = ProcessRunner::new(Arc::clone(&registry), RunnerLimits::from_settings(&settings));
        let coordinator = CompileExecuteCoordinator::new(settings.clone(), runner.clone());
        let analyzer = SourceAnalyzer::new(&settings, runner)?;
        let sweeper = ProcessSweeper::new(
            Arc::clone(&registry),
            settings.sweep_interval(),
            settings.sweep_min_age(),
        );

        Ok(Self {
            settings,
            registry,
            coordinator,
            analyzer,
            sweeper,
        })
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Start-up for a long-lived service: kill compiler processes orphaned by a
    /// previous instance, reclaim stale workspaces and start sweeping.
    ///
    /// Only one service may own a compiler installation; the orphan scan kills
    /// every AST dump of `compiler_path`, including those of live siblings.
    pub fn start_service(&mut self) -> Result<()> {
        info!("Starting playground service (compiler {})", self.settings.compiler_path.display());

        let pattern = orphans::orphan_pattern(&self.settings.compiler_path, &self.settings.ast_flags);
        let killed = orphans::kill_orphans(&pattern);
        if killed > 0 {
            warn!("Killed {} orphaned compiler processes", killed);
        }

        self.prepare();
        self.sweeper.start()
    }

    /// Per-invocation housekeeping that is safe next to concurrent instances:
    /// reclaim stale workspaces only.
    pub fn prepare(&self) {
        let workspaces = WorkspaceManager::new(self.settings.temp_directory.clone());
        match workspaces.cleanup_old_workspaces(self.settings.stale_workspace_age()) {
            Ok(0) => {}
            Ok(n) => info!("Reclaimed {} stale workspaces", n),
            Err(e) => warn!("Stale workspace cleanup failed: {}", e),
        }
    }

    /// Stop the sweeper and kill every tracked process. Safe to call twice.
    pub fn stop(&mut self) {
        self.sweeper.stop();
        let killed = self.registry.kill_all();
        if killed > 0 {
            info!("Killed {} processes at shutdown", killed);
        }
    }

    pub fn compile_and_execute(&self, source: &str) -> CompileOutcome {
        self.coordinator.compile_and_execute(source)
    }

    pub fn compile(&self, source: &str) -> CompileResponse {
        self.compile_and_execute(source).into()
    }

    pub fn analyze(&self, source: &str) -> AnalysisResponse {
        self.analyzer.analyze(source)
    }

    pub fn check_compiler(&self) -> CompilerStatus {
        let path = &self.settings.compiler_path;
        CompilerStatus {
            compiler_path: path.clone(),
            exists: path.exists(),
            executable: is_executable(path),
            temp_directory: self.settings.temp_directory.clone(),
        }
    }
}

impl Drop for Playground {
    fn drop(&mut self) {
        self.stop();
    }
}
