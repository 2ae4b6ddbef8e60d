/// Compile-then-execute flow for one snippet
use crate::config::settings::CompilerSettings;
use crate::config::types::{CompileOutcome, PlaygroundError, Result};
use crate::core::source::SourceUnit;
use crate::exec::runner::ProcessRunner;
use crate::judge::artifacts::{self, SOURCE_EXTENSION};
use crate::judge::toolchain::TrivilToolchain;
use crate::safety::cleanup;
use crate::safety::workspace::{Workspace, WorkspaceManager, RUN_PREFIX};
use crate::utils::output::truncate_output;
use log::{error, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const EXECUTABLE_NOT_FOUND: &str =
    "Compiled executable not found. Compilation may have failed silently.";

/// File names for one compile session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNames {
    pub source_name: String,
    pub base_name: String,
}

impl SessionNames {
    /// `temp_<8 hex>.tri` and its stem
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let base_name = format!("temp_{}", &id[..8]);
        Self {
            source_name: format!("{}{}", base_name, SOURCE_EXTENSION),
            base_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileExecuteCoordinator {
    settings: CompilerSettings,
    toolchain: TrivilToolchain,
    runner: ProcessRunner,
    workspaces: WorkspaceManager,
}

impl CompileExecuteCoordinator {
    pub fn new(settings: CompilerSettings, runner: ProcessRunner) -> Self {
        Self {
            toolchain: TrivilToolchain::from_settings(&settings),
            workspaces: WorkspaceManager::new(settings.temp_directory.clone()),
            settings,
            runner,
        }
    }

    /// Compile `source` and, when that succeeds, run the produced program.
    ///
    /// Never fails: every problem is reported as one of the outcome kinds.
    pub fn compile_and_execute(&self, source: &str) -> CompileOutcome {
        let unit = match self.accept_input(source) {
            Ok(unit) => unit,
            Err(e) => {
                info!("Rejected compile request: {}", e);
                return CompileOutcome::CompilationError {
                    message: rejection_message(e),
                };
            }
        };

        let started = Instant::now();
        match self.run_session(&unit, started) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Compile session failed: {}", e);
                CompileOutcome::CompilationError {
                    message: format!("Internal server error: {}", e),
                }
            }
        }
    }

    fn accept_input(&self, source: &str) -> Result<SourceUnit> {
        if source.trim().is_empty() {
            return Err(PlaygroundError::InputRejected(
                "Source code cannot be empty".to_string(),
            ));
        }
        if source.chars().count() > self.settings.max_source_length {
            return Err(PlaygroundError::InputRejected(format!(
                "Source code exceeds maximum length of {} characters",
                self.settings.max_source_length
            )));
        }
        Ok(SourceUnit::for_compile(source))
    }

    fn run_session(&self, unit: &SourceUnit, started: Instant) -> Result<CompileOutcome> {
        // Dropping the workspace on an early return disposes it as well
        let mut workspace = self.workspaces.create_workspace(RUN_PREFIX)?;

        let purged = cleanup::purge_stale_artifacts(self.workspaces.base_dir());
        if purged > 0 {
            info!("Purged {} stale artifacts from {}", purged, self.workspaces.base_dir().display());
        }

        let names = SessionNames::generate();
        let source_path = workspace.write_source(&names.source_name, unit.text())?;
        info!("Created temporary source file: {}", source_path.display());

        let outcome = self.compile_then_execute(&workspace, &names, started);
        workspace.dispose();
        Ok(outcome)
    }

    fn compile_then_execute(
        &self,
        workspace: &Workspace,
        names: &SessionNames,
        started: Instant,
    ) -> CompileOutcome {
        let dir = workspace.dir();

        if let Err(message) = self.compile(dir, names) {
            return CompileOutcome::CompilationError { message };
        }

        let executable = match artifacts::locate_executable(dir, &names.base_name, &names.source_name)
        {
            Some(path) => path,
            None => {
                error!(
                    "Executable not found. Files in workspace: {:?}",
                    artifacts::list_dir_names(dir)
                );
                return CompileOutcome::RuntimeError {
                    message: EXECUTABLE_NOT_FOUND.to_string(),
                    elapsed_ms: elapsed_ms(started),
                };
            }
        };
        info!("Found executable: {}", executable.display());

        self.execute(dir, &executable, started)
    }

    /// Ok when the compiler reported success, Err with the text to report otherwise
    fn compile(&self, dir: &Path, names: &SessionNames) -> std::result::Result<(), String> {
        let timeout = self.settings.compilation_timeout();
        info!(
            "Executing compiler: {} {}",
            self.toolchain.compiler_path().display(),
            names.source_name
        );

        let run = self.runner.run(
            self.toolchain.compiler_path(),
            self.toolchain.compile_args(&names.source_name),
            dir,
            timeout,
        );

        let run = match run {
            Ok(run) => run,
            Err(PlaygroundError::TimedOut { timeout_ms }) => {
                return Err(format!("Compilation timed out after {}ms", timeout_ms));
            }
            Err(PlaygroundError::SpawnFailed { source, .. }) => {
                return Err(format!("Failed to execute compiler: {}", source));
            }
            Err(e) => return Err(format!("Failed to execute compiler: {}", e)),
        };

        let output = run.output.trim();
        let artifact_present = artifacts::probe_executable(dir, &names.base_name).is_some();
        let success = artifacts::compilation_succeeded(run.exit_code, output, artifact_present);
        info!(
            "Compilation finished with exit code: {:?}, executable exists: {}, overall success: {}",
            run.exit_code, artifact_present, success
        );

        if success {
            return Ok(());
        }
        if output.is_empty() {
            return Err(match run.exit_code {
                Some(code) => format!("Compilation failed with exit code {}", code),
                None => "Compilation failed: compiler was terminated by a signal".to_string(),
            });
        }
        Err(output.to_string())
    }

    fn execute(&self, dir: &Path, executable: &Path, started: Instant) -> CompileOutcome {
        // The child runs with `dir` as its cwd, so hand it an absolute path
        let program = std::fs::canonicalize(executable).unwrap_or_else(|e| {
            warn!("Could not canonicalize {}: {}", executable.display(), e);
            executable.to_path_buf()
        });
        info!("Executing program: {}", program.display());

        match self
            .runner
            .run(&program, Vec::<String>::new(), dir, self.settings.execution_timeout())
        {
            Ok(run) => {
                let output = truncate_output(run.output.trim(), self.settings.max_output_length);
                info!("Program execution finished with exit code: {:?}", run.exit_code);
                if run.success() {
                    CompileOutcome::Success {
                        output,
                        elapsed_ms: elapsed_ms(started),
                    }
                } else {
                    CompileOutcome::RuntimeError {
                        message: output,
                        elapsed_ms: elapsed_ms(started),
                    }
                }
            }
            Err(PlaygroundError::TimedOut { timeout_ms }) => CompileOutcome::Timeout {
                message: format!("Program execution timed out after {}ms", timeout_ms),
            },
            Err(PlaygroundError::SpawnFailed { source, .. }) => CompileOutcome::RuntimeError {
                message: format!("Failed to execute program: {}", source),
                elapsed_ms: elapsed_ms(started),
            },
            Err(e) => CompileOutcome::RuntimeError {
                message: format!("Failed to execute program: {}", e),
                elapsed_ms: elapsed_ms(started),
            },
        }
    }
}

fn rejection_message(err: PlaygroundError) -> String {
    match err {
        PlaygroundError::InputRejected(message) => message,
        other => other.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed: Duration = started.elapsed();
    elapsed.as_millis() as u64
}
