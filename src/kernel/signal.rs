/// Async-safe shutdown signal handling for the tribox binary
/// The handler only stores atomics; a watcher thread does the actual cleanup.
use crate::config::types::{PlaygroundError, Result};
use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Global shutdown flag (async-safe atomic)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Global signal received (async-safe atomic)
static SIGNAL_RECEIVED: AtomicU32 = AtomicU32::new(0);

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Signal handler state
pub struct SignalHandler;

impl SignalHandler {
    /// Install handlers for SIGINT, SIGTERM and SIGHUP.
    /// Call early in main(), before worker threads are spawned.
    pub fn init() -> Result<Self> {
        let sig_action = SigAction::new(
            SigHandler::Handler(Self::signal_handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            // SAFETY: the handler only touches atomics
            unsafe { signal::sigaction(sig, &sig_action) }.map_err(|e| {
                PlaygroundError::Process(format!("Failed to install {} handler: {}", sig, e))
            })?;
        }

        info!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
        Ok(Self)
    }

    /// No allocations, no locks, no I/O
    extern "C" fn signal_handler(signal: libc::c_int) {
        SIGNAL_RECEIVED.store(signal as u32, Ordering::SeqCst);
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }

    /// Signal that was received (0 if none)
    pub fn received_signal(&self) -> u32 {
        SIGNAL_RECEIVED.load(Ordering::SeqCst)
    }

    /// Conventional shell exit status for death by the received signal
    pub fn exit_code(&self) -> i32 {
        128 + self.received_signal() as i32
    }

    /// Returns true if a signal arrived before `timeout`
    pub fn wait_for_signal(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.shutdown_requested() {
                return true;
            }
            thread::sleep(WATCH_INTERVAL);
        }
        self.shutdown_requested()
    }

    /// Run `on_signal(exit_code)` on a background thread once a shutdown signal arrives
    pub fn spawn_watcher<F>(self, on_signal: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(i32) + Send + 'static,
    {
        thread::Builder::new()
            .name("tribox-signals".to_string())
            .spawn(move || {
                while !self.wait_for_signal(WATCH_INTERVAL * 20) {}
                info!("Received signal {}, shutting down", self.received_signal());
                on_signal(self.exit_code());
            })
            .map_err(PlaygroundError::Io)
    }

    #[cfg(test)]
    fn reset(&self) {
        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
        SIGNAL_RECEIVED.store(0, Ordering::SeqCst);
    }
}
