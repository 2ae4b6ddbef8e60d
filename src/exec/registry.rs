/// Registry of in-flight child processes
/// Shared by request threads, the periodic sweeper and shutdown. Every
/// registration is paired with exactly one removal through [`Registration`].

use crate::config::types::{PlaygroundError, Result};
use crate::utils::output::OutputDrain;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub type ProcessId = u64;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One tracked child process
#[derive(Debug)]
pub struct ProcessHandle {
    id: ProcessId,
    pid: u32,
    label: String,
    started_at: DateTime<Utc>,
    started: Instant,
    child: Mutex<Child>,
    drain: Mutex<Option<OutputDrain>>,
}

impl ProcessHandle {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn runtime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking exit poll
    pub fn try_wait(&self) -> std::io::Result<Option<ExitStatus>> {
        lock(&self.child).try_wait()
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    pub fn attach_drain(&self, drain: OutputDrain) {
        *lock(&self.drain) = Some(drain);
    }

    pub fn take_drain(&self) -> Option<OutputDrain> {
        lock(&self.drain).take()
    }

    /// SIGKILL the child, cancel its drain and wait up to `grace` for it to be reaped
    pub fn force_kill(&self, grace: Duration) -> Result<()> {
        if let Some(mut drain) = self.take_drain() {
            drain.cancel();
        }

        let mut child = lock(&self.child);
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        warn!("Force killing process {} (pid {}, {})", self.id, self.pid, self.label);
        if let Err(e) = child.kill() {
            // InvalidInput means it already exited between the poll and the kill
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(PlaygroundError::Process(format!(
                    "kill(pid {}) failed: {}",
                    self.pid, e
                )));
            }
        }

        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return Ok(()),
                Ok(None) if Instant::now() >= deadline => {
                    return Err(PlaygroundError::Process(format!(
                        "pid {} did not exit within {:?} of SIGKILL",
                        self.pid, grace
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(PlaygroundError::Process(format!(
                        "wait(pid {}) failed: {}",
                        self.pid, e
                    )))
                }
            }
        }
    }
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries whose process had already exited
    pub reaped: usize,
    /// Entries force-killed because they could not be confirmed finished
    pub killed: usize,
    /// Entries kept (younger than the sweep minimum age)
    pub remaining: usize,
}

/// Concurrent id -> handle map
#[derive(Debug)]
pub struct ProcessRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<ProcessId, Arc<ProcessHandle>>>,
    kill_grace: Duration,
}

impl ProcessRegistry {
    pub fn new(kill_grace: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
            kill_grace,
        }
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    /// Track a freshly spawned child. Dropping the returned guard removes the
    /// entry and kills the child if it is still running.
    pub fn register(&self, child: Child, label: impl Into<String>) -> Registration<'_> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = Arc::new(ProcessHandle {
            id,
            pid: child.id(),
            label: label.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            child: Mutex::new(child),
            drain: Mutex::new(None),
        });

        lock(&self.entries).insert(id, Arc::clone(&handle));
        debug!("Registered process {} (pid {}, {})", id, handle.pid, handle.label);

        Registration {
            registry: self,
            handle,
        }
    }

    pub fn deregister(&self, id: ProcessId) -> Option<Arc<ProcessHandle>> {
        let removed = lock(&self.entries).remove(&id);
        if removed.is_some() {
            debug!("Deregistered process {}", id);
        }
        removed
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        lock(&self.entries).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Remove exited entries and force-kill anything still running that is at
    /// least `min_age` old. Running entries are treated as stuck.
    pub fn sweep(&self, min_age: Duration) -> SweepReport {
        let snapshot: Vec<Arc<ProcessHandle>> = lock(&self.entries).values().cloned().collect();
        let mut report = SweepReport::default();
        let mut finished = Vec::new();

        for handle in snapshot {
            match handle.try_wait() {
                Ok(Some(_)) => {
                    debug!("Removing exited process {}", handle.id());
                    report.reaped += 1;
                    finished.push(handle.id());
                }
                Ok(None) if handle.runtime() < min_age => {
                    report.remaining += 1;
                }
                Ok(None) | Err(_) => {
                    warn!(
                        "Sweeping process {} (pid {}) running for {:?}",
                        handle.id(),
                        handle.pid(),
                        handle.runtime()
                    );
                    if let Err(e) = handle.force_kill(self.kill_grace) {
                        warn!("Sweep failed to kill process {}: {}", handle.id(), e);
                    }
                    report.killed += 1;
                    finished.push(handle.id());
                }
            }
        }

        let mut entries = lock(&self.entries);
        for id in finished {
            entries.remove(&id);
        }
        drop(entries);

        info!(
            "Process sweep: reaped {}, killed {}, active {}",
            report.reaped,
            report.killed,
            self.len()
        );
        report
    }

    /// Force-terminate every tracked process concurrently and clear the registry
    pub fn kill_all(&self) -> usize {
        let drained: Vec<Arc<ProcessHandle>> = {
            let mut entries = lock(&self.entries);
            entries.drain().map(|(_, handle)| handle).collect()
        };
        let count = drained.len();
        info!("Killing {} active processes", count);

        let grace = self.kill_grace;
        std::thread::scope(|scope| {
            for handle in &drained {
                scope.spawn(move || {
                    if let Err(e) = handle.force_kill(grace) {
                        warn!("Failed to kill process {}: {}", handle.id(), e);
                    }
                });
            }
        });

        count
    }
}

/// Guard tying one registry entry to the lifetime of a run
#[derive(Debug)]
pub struct Registration<'a> {
    registry: &'a ProcessRegistry,
    handle: Arc<ProcessHandle>,
}

impl Registration<'_> {
    pub fn handle(&self) -> &Arc<ProcessHandle> {
        &self.handle
    }

    pub fn id(&self) -> ProcessId {
        self.handle.id()
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.deregister(self.handle.id());
        if self.handle.is_alive() {
            if let Err(e) = self.handle.force_kill(self.registry.kill_grace) {
                warn!("Failed to kill process {} on release: {}", self.handle.id(), e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn spawn(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    fn wait_until_exited(handle: &ProcessHandle) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_alive() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_register_and_release() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let id = {
            let registration = registry.register(spawn("exit 0"), "short");
            assert!(registry.contains(registration.id()));
            registration.id()
        };
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let a = registry.register(spawn("exit 0"), "a");
        let b = registry.register(spawn("exit 0"), "b");
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_release_kills_running_child() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let registration = registry.register(spawn("sleep 30"), "sleeper");
        let handle = Arc::clone(registration.handle());
        drop(registration);
        assert!(!handle.is_alive());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_reaps_exited_and_kills_running() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let done = registry.register(spawn("exit 0"), "done");
        wait_until_exited(done.handle());
        let stuck = registry.register(spawn("sleep 30"), "stuck");

        let report = registry.sweep(Duration::ZERO);
        assert_eq!(report.reaped, 1);
        assert_eq!(report.killed, 1);
        assert!(registry.is_empty());
        assert!(!stuck.handle().is_alive());
    }

    #[test]
    fn test_sweep_spares_young_processes() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let young = registry.register(spawn("sleep 30"), "young");

        let report = registry.sweep(Duration::from_secs(3600));
        assert_eq!(report.remaining, 1);
        assert!(registry.contains(young.id()));
        assert!(young.handle().is_alive());
    }

    #[test]
    fn test_kill_all_clears_registry() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let a = registry.register(spawn("sleep 30"), "a");
        let b = registry.register(spawn("sleep 30"), "b");

        assert_eq!(registry.kill_all(), 2);
        assert!(registry.is_empty());
        assert!(!a.handle().is_alive());
        assert!(!b.handle().is_alive());
    }

    #[test]
    fn test_force_kill_exited_process_is_ok() {
        let registry = ProcessRegistry::new(Duration::from_secs(2));
        let registration = registry.register(spawn("exit 0"), "exited");
        wait_until_exited(registration.handle());
        assert!(registration.handle().force_kill(Duration::from_millis(100)).is_ok());
    }
}
