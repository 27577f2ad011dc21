//! Hand-off of render work to a single UI thread.

use tokio::sync::mpsc;
use tracing::{debug, trace};

type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Posts closures to the UI thread. Cheap to clone.
#[derive(Clone)]
pub struct UiDispatcher {
    tx: mpsc::UnboundedSender<UiTask>,
}

impl UiDispatcher {
    /// Queues `task` for the UI thread. Returns false once the queue is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

impl std::fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDispatcher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// The receiving end, owned by whatever plays the UI thread.
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

/// Creates a connected dispatcher and queue.
#[must_use]
pub fn ui_channel() -> (UiDispatcher, UiQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiDispatcher { tx }, UiQueue { rx })
}

impl UiQueue {
    /// Runs every task queued so far. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "Drained UI queue");
        }
        ran
    }

    /// Waits for one task and runs it. Returns false once every
    /// dispatcher is dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks until every dispatcher is dropped.
    pub async fn run(mut self) {
        while self.run_next().await {}
        debug!("UI queue closed");
    }

    /// Moves the queue onto a dedicated OS thread.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_thread(self) -> std::io::Result<std::thread::JoinHandle<()>> {
        let mut rx = self.rx;
        std::thread::Builder::new()
            .name("pixload-ui".to_string())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                debug!("UI thread stopped");
            })
    }
}
