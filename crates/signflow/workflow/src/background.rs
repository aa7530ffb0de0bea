//! Fire-and-forget task tracking.
//!
//! Notification delivery and export rendering run after the triggering call
//! has returned. Handles are kept so callers can wait for outstanding work on
//! shutdown (and tests can observe its effects deterministically).

use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime. Without a runtime the task is
    /// dropped with a warning.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(runtime) => runtime.spawn(task),
            Err(_) => {
                warn!(task = label, "no tokio runtime; background work dropped");
                return;
            }
        };

        match self.handles.lock() {
            Ok(mut handles) => {
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
            }
            Err(_) => warn!(task = label, "background task registry poisoned; task detached"),
        }
    }

    /// Wait for every task spawned so far, including tasks spawned by them.
    pub async fn drain(&self) {
        loop {
            let pending = match self.handles.lock() {
                Ok(mut handles) => std::mem::take(&mut *handles),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    warn!(error = %err, "background task aborted");
                }
            }
        }
    }
}
