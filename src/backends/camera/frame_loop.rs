// SPDX-License-Identifier: GPL-3.0-only
//! Capture thread lifecycle
//!
//! Each V4L2 stream captures on its own thread. Device setup runs on that
//! thread too, and [`CaptureThread::spawn`] blocks until setup has either
//! produced a streaming device or failed, so callers see acquisition errors
//! (busy device, permission) synchronously. Shutting the thread down joins
//! it, which releases the device before a new one is opened.

use super::types::{BackendError, BackendResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What the capture thread should do after one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The device is gone or broken; end the thread
    Finish,
}

/// Handle to a running capture thread
pub struct CaptureThread {
    handle: Option<JoinHandle<()>>,
    /// Cleared to request shutdown, and by the thread itself when it exits
    running: Arc<AtomicBool>,
    name: String,
}

impl CaptureThread {
    /// Spawn a capture thread and wait for its setup to finish
    ///
    /// `init` runs on the new thread and returns the per-thread state plus a
    /// value handed back to the caller (e.g. the negotiated format). `step`
    /// then runs repeatedly until it returns [`Step::Finish`] or the thread
    /// is shut down.
    pub fn spawn<S, R, I, F>(
        name: impl Into<String>,
        init: I,
        mut step: F,
    ) -> BackendResult<(Self, R)>
    where
        S: 'static,
        R: Send + 'static,
        I: FnOnce() -> BackendResult<(S, R)> + Send + 'static,
        F: FnMut(&mut S) -> Step + Send + 'static,
    {
        let name = name.into();
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<BackendResult<R>>();

        let thread_running = Arc::clone(&running);
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut state = match init() {
                    Ok((state, report)) => {
                        let _ = ready_tx.send(Ok(report));
                        state
                    }
                    Err(e) => {
                        thread_running.store(false, Ordering::Release);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while thread_running.load(Ordering::Acquire) {
                    if step(&mut state) == Step::Finish {
                        warn!(name = %thread_name, "Capture thread finished on its own");
                        break;
                    }
                }

                thread_running.store(false, Ordering::Release);
                debug!(name = %thread_name, "Capture thread exiting");
            })
            .map_err(|e| {
                BackendError::StreamFailed(format!("{}: cannot spawn capture thread: {}", name, e))
            })?;

        let mut thread = Self {
            handle: Some(handle),
            running,
            name,
        };

        let outcome = ready_rx.recv().unwrap_or_else(|_| {
            Err(BackendError::StreamFailed(format!(
                "{}: capture thread exited during setup",
                thread.name
            )))
        });

        match outcome {
            Ok(report) => {
                info!(name = %thread.name, "Capture thread streaming");
                Ok((thread, report))
            }
            Err(e) => {
                thread.shutdown();
                Err(e)
            }
        }
    }

    /// Whether the thread is still capturing
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Ask the thread to stop and wait for it
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(name = %self.name, "Capture thread panicked");
        } else {
            debug!(name = %self.name, "Capture thread joined");
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
