//! Bounded worker pools for load actions and storage writes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Default)]
struct PendingWrites {
    count: AtomicUsize,
    idle: Notify,
}

/// Marks one scheduled storage write. Dropping it completes the write.
pub(crate) struct WriteTicket {
    pending: Arc<PendingWrites>,
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        if self.pending.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.pending.idle.notify_waiters();
        }
    }
}

/// Runs load actions on a runtime with separate concurrency limits for
/// loading and for storage cache writes.
#[derive(Debug, Clone)]
pub struct Executor {
    runtime: Handle,
    workers: Arc<Semaphore>,
    writers: Arc<Semaphore>,
    pending: Arc<PendingWrites>,
}

impl Executor {
    /// Creates an executor on `runtime`. Zero limits are raised to one.
    #[must_use]
    pub fn new(runtime: Handle, load_workers: usize, cache_writers: usize) -> Self {
        Self {
            runtime,
            workers: Arc::new(Semaphore::new(load_workers.max(1))),
            writers: Arc::new(Semaphore::new(cache_writers.max(1))),
            pending: Arc::new(PendingWrites::default()),
        }
    }

    /// Creates an executor on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn current(load_workers: usize, cache_writers: usize) -> Self {
        Self::new(Handle::current(), load_workers, cache_writers)
    }

    /// Returns the number of storage writes scheduled but not finished.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Waits until every scheduled storage write has finished.
    pub async fn writes_settled(&self) {
        loop {
            let idle = self.pending.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.pending_writes() == 0 {
                return;
            }
            idle.await;
        }
    }

    pub(crate) fn workers(&self) -> Arc<Semaphore> {
        self.workers.clone()
    }

    pub(crate) fn writers(&self) -> Arc<Semaphore> {
        self.writers.clone()
    }

    pub(crate) fn begin_write(&self) -> WriteTicket {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        WriteTicket {
            pending: self.pending.clone(),
        }
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(task);
    }
}
