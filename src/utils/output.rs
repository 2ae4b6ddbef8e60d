/// Output draining and bounds
/// The child's merged stdout/stderr pipe is read on a dedicated thread from
/// the moment it is spawned, so a chatty child can never fill the pipe buffer
/// and block while the caller waits for it to exit.

use crate::config::types::{PlaygroundError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Marker appended after output cut to the configured length
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Background reader that drains one pipe into memory
#[derive(Debug)]
pub struct OutputDrain {
    rx: Receiver<Vec<u8>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OutputDrain {
    /// Start draining `reader`. Bytes past `capture_limit` are read and discarded.
    pub fn spawn<R: Read + Send + 'static>(reader: R, capture_limit: usize) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = thread::Builder::new()
            .name("tribox-drain".to_string())
            .spawn(move || {
                let buffer = drain_stream(reader, capture_limit, &flag);
                // Receiver may already be gone after a cancel
                let _ = tx.send(buffer);
            })
            .map_err(|e| PlaygroundError::Process(format!("failed to start output drain: {}", e)))?;

        Ok(Self {
            rx,
            cancelled,
            handle: Some(handle),
        })
    }

    /// Wait up to `grace` for the drained bytes. `None` when they are not ready in time.
    pub fn collect(mut self, grace: Duration) -> Option<Vec<u8>> {
        match self.rx.recv_timeout(grace) {
            Ok(buffer) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Some(buffer)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Output drain not finished after {:?}, abandoning it", grace);
                self.cancel();
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Output drain thread exited without a result");
                None
            }
        }
    }

    /// Stop collecting. The thread exits as soon as its pending read returns,
    /// which happens once the last writer of the pipe is gone.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Detach; joining here could block on a read held open by a grandchild
        self.handle.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for OutputDrain {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
        }
    }
}

fn drain_stream<R: Read>(mut reader: R, limit: usize, cancelled: &AtomicBool) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buffer.len());
                buffer.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Output drain stopped on read error: {}", e);
                break;
            }
        }
    }

    buffer
}

/// Cut `text` to at most `max_chars` characters, appending the truncation marker
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text.to_string(),
    }
}
