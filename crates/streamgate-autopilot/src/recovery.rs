//! Recovery-window manager.
//!
//! Watches runtime lifecycle changes and answers one question: is it safe
//! to make a scaling decision right now? The window is *open* (unsafe)
//! while the runtime is in any non-steady state, and for a grace interval
//! after it re-enters `Running` — freshly reassigned partitions report lag
//! that says nothing about the new topology's throughput yet.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use streamgate_core::RuntimeState;

struct WindowState {
    current: RuntimeState,
    /// When the runtime last (re-)entered `Running`.
    running_since: Option<Instant>,
}

/// Tracks runtime state changes and exposes the open-window predicate.
pub struct RecoveryWindowManager {
    grace: Duration,
    inner: Arc<Mutex<WindowState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RecoveryWindowManager {
    /// Subscribe to `receiver` and keep following it until [`shutdown`].
    ///
    /// The grace interval defaults to the autopilot's evaluation period at
    /// the call site, so one full evaluation cycle passes before the first
    /// post-rebalance decision.
    ///
    /// [`shutdown`]: RecoveryWindowManager::shutdown
    pub fn new(mut receiver: watch::Receiver<RuntimeState>, grace: Duration) -> Self {
        let initial = *receiver.borrow();
        let inner = Arc::new(Mutex::new(WindowState {
            current: initial,
            running_since: initial.is_running().then(Instant::now),
        }));

        let watched = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let next = *receiver.borrow();
                let mut state = watched.lock().unwrap();
                if next.is_running() && !state.current.is_running() {
                    state.running_since = Some(Instant::now());
                }
                state.current = next;
                debug!(state = %next, "observed runtime state change");
            }
        });

        Self {
            grace,
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// True while scaling decisions must be suppressed.
    pub fn is_open(&self) -> bool {
        let state = self.inner.lock().unwrap();
        if !state.current.is_running() {
            return true;
        }
        match state.running_since {
            Some(since) => since.elapsed() < self.grace,
            None => true,
        }
    }

    /// Stop following the runtime's state changes.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl Drop for RecoveryWindowManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
