/// Periodic sweep of the process registry
use crate::config::types::{PlaygroundError, Result};
use crate::exec::registry::ProcessRegistry;
use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread that calls [`ProcessRegistry::sweep`] every `interval`
pub struct ProcessSweeper {
    registry: Arc<ProcessRegistry>,
    interval: Duration,
    min_age: Duration,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ProcessSweeper {
    pub fn new(registry: Arc<ProcessRegistry>, interval: Duration, min_age: Duration) -> Self {
        Self {
            registry,
            interval,
            min_age,
            shutdown: None,
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Start the sweep thread. Calling it twice is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let registry = Arc::clone(&self.registry);
        let interval = self.interval;
        let min_age = self.min_age;

        let thread = thread::Builder::new()
            .name("tribox-sweeper".to_string())
            .spawn(move || {
                info!("Started process sweeper (every {:?})", interval);
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            registry.sweep(min_age);
                        }
                        // Stop requested or the sweeper was dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("Process sweeper shutting down");
            })
            .map_err(|e| PlaygroundError::Process(format!("failed to start sweeper: {}", e)))?;

        self.shutdown = Some(shutdown_tx);
        self.thread = Some(thread);
        Ok(())
    }

    /// Signal the thread and wait for it to finish its current pass
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Process sweeper thread panicked");
            }
        }
    }
}

impl Drop for ProcessSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
