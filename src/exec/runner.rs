/// Child process execution under a hard timeout
use crate::config::settings::CompilerSettings;
use crate::config::types::{PlaygroundError, Result};
use crate::exec::registry::ProcessRegistry;
use crate::utils::output::OutputDrain;
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

const MIN_POLL: Duration = Duration::from_millis(1);
const MAX_POLL: Duration = Duration::from_millis(25);

/// Bounds applied around every run
#[derive(Debug, Clone, Copy)]
pub struct RunnerLimits {
    /// How long to wait for a SIGKILLed child to be reaped
    pub kill_grace: Duration,
    /// How long to wait for drained output after the child exited
    pub drain_grace: Duration,
    /// Bytes of merged output kept in memory
    pub capture_limit: usize,
}

impl Default for RunnerLimits {
    fn default() -> Self {
        Self {
            kill_grace: Duration::from_secs(2),
            drain_grace: Duration::from_secs(5),
            capture_limit: 8 * 1024 * 1024,
        }
    }
}

impl RunnerLimits {
    pub fn from_settings(settings: &CompilerSettings) -> Self {
        Self {
            kill_grace: settings.kill_grace(),
            drain_grace: settings.drain_grace(),
            capture_limit: settings.max_capture_bytes,
        }
    }
}

/// Result of a child that exited on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Merged stdout and stderr, lossily decoded
    pub output: String,
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns external processes and tracks them in a shared registry
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    registry: Arc<ProcessRegistry>,
    limits: RunnerLimits,
}

impl ProcessRunner {
    pub fn new(registry: Arc<ProcessRegistry>, limits: RunnerLimits) -> Self {
        Self { registry, limits }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Run `program args...` in `working_dir` with stdout and stderr merged.
    ///
    /// Returns [`PlaygroundError::SpawnFailed`] when the OS cannot start the
    /// process and [`PlaygroundError::TimedOut`] when it is still running after
    /// `timeout`; in that case it has been killed before this returns.
    pub fn run<I, S>(
        &self,
        program: impl AsRef<OsStr>,
        args: I,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let label = program.to_string_lossy().into_owned();
        let spawn_failed = |source: std::io::Error| PlaygroundError::SpawnFailed {
            program: label.clone(),
            source,
        };

        let started = Instant::now();
        let (reader, writer) = os_pipe::pipe().map_err(spawn_failed)?;
        let stdout_writer = writer.try_clone().map_err(spawn_failed)?;

        // The Command owns the parent's copies of the write end; it must be
        // dropped right after spawn or the drain never sees EOF.
        let child = {
            let mut cmd = Command::new(program);
            cmd.args(args)
                .current_dir(working_dir)
                .stdin(Stdio::null())
                .stdout(stdout_writer)
                .stderr(writer);
            cmd.spawn()
        }
        .map_err(spawn_failed)?;

        info!("Spawned {} (pid {}) in {}", label, child.id(), working_dir.display());

        let registration = self.registry.register(child, label.clone());
        let handle = registration.handle();
        handle.attach_drain(OutputDrain::spawn(reader, self.limits.capture_limit)?);

        let deadline = started + timeout;
        let mut poll = MIN_POLL;
        let status = loop {
            match handle.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "Process {} ({}) timed out after {}ms, force killing",
                            handle.id(),
                            label,
                            timeout.as_millis()
                        );
                        if let Err(e) = handle.force_kill(self.limits.kill_grace) {
                            warn!("Timed out process {} could not be reaped: {}", handle.id(), e);
                        }
                        return Err(PlaygroundError::TimedOut {
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(poll.min(deadline - now));
                    poll = (poll * 2).min(MAX_POLL);
                }
                Err(e) => {
                    return Err(PlaygroundError::Process(format!(
                        "wait({}) failed: {}",
                        label, e
                    )))
                }
            }
        };

        let bytes = match handle.take_drain() {
            Some(drain) => drain.collect(self.limits.drain_grace).unwrap_or_default(),
            // Cancelled by a concurrent sweep or shutdown
            None => Vec::new(),
        };
        drop(registration);

        #[cfg(unix)]
        let signal = status.signal();
        #[cfg(not(unix))]
        let signal = None;

        let result = RunOutput {
            exit_code: status.code(),
            signal,
            output: String::from_utf8_lossy(&bytes).into_owned(),
            elapsed: started.elapsed(),
        };

        debug!(
            "{} exited with code {:?} (signal {:?}) in {:?}, {} output bytes",
            label,
            result.exit_code,
            result.signal,
            result.elapsed,
            bytes.len()
        );
        Ok(result)
    }
}
