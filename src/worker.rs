use std::mem;

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

/// A handle to a set of background loops.
///
/// Used for shutting the loops down and waiting for them to finish.
///
/// ## Drop
///
/// Dropping the handle aborts any loop still running. Call [`WorkerHandle::shut_down()`] then
/// [`WorkerHandle::wait_for_shutdown()`] to stop gracefully.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Tells a loop when to stop.
///
/// Loops check it at the top of each cycle. In-flight delays are never interrupted.
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl WorkerHandle {
    /// Create a handle and the stop signal its loops should watch.
    pub(crate) fn new(name: impl Into<String>) -> (Self, StopSignal) {
        let (stop_tx, rx) = watch::channel(false);

        (
            Self {
                name: name.into(),
                stop_tx,
                tasks: Mutex::new(Vec::new()),
            },
            StopSignal { rx },
        )
    }

    /// Track a spawned loop.
    pub(crate) fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.get_mut().push(task);
    }

    /// The name given to these loops.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the loops to stop at their next cycle boundary.
    ///
    /// Idempotent.
    pub fn shut_down(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Whether [`shut_down()`](WorkerHandle::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Wait for every loop to finish.
    ///
    /// Does not itself ask the loops to stop.
    pub async fn wait_for_shutdown(&self) {
        let tasks = mem::take(&mut *self.tasks.lock().await);

        for task in tasks {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!("A loop in '{}' panicked", self.name);
                }
            }
        }

        info!("'{}' has shut down", self.name);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().iter() {
            task.abort();
        }
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        // A dropped handle aborts the loops anyway.
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&mut self) {
        // Errors if the handle was dropped, which also means stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
