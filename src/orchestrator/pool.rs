//! Fixed-size worker pool over a bounded queue
//!
//! `workers` tokio tasks share one `mpsc` receiver. Producers reserve a slot
//! with [`WorkerPool::try_reserve`] and get [`PoolError::Full`] instead of
//! waiting when the queue is at capacity. Items still queued at shutdown
//! are handed back to the caller.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("job queue is full")]
    Full,
    #[error("worker pool is shut down")]
    Closed,
}

pub struct WorkerPool<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `workers` tasks running `handler` for each queued item.
    pub fn spawn<F, Fut>(workers: usize, queue_depth: usize, cancel: CancellationToken, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        let handles = (0..workers.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    debug!(worker = id, "Worker started");
                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            item = async { rx.lock().await.recv().await } => item,
                        };
                        let Some(item) = next else {
                            break;
                        };
                        handler(item).await;
                    }
                    debug!(worker = id, "Worker stopped");
                })
            })
            .collect();

        info!(workers = workers.max(1), queue_depth = queue_depth.max(1), "Worker pool started");
        Self {
            tx,
            rx,
            cancel,
            workers: Mutex::new(handles),
        }
    }

    /// Reserve one queue slot without waiting.
    pub fn try_reserve(&self) -> Result<mpsc::Permit<'_, T>, PoolError> {
        self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => PoolError::Full,
            mpsc::error::TrySendError::Closed(()) => PoolError::Closed,
        })
    }

    /// Free queue slots.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Stop workers after their current item and wait for them.
    ///
    /// Closes the queue and returns the items no worker picked up.
    pub async fn shutdown(&self) -> Vec<T> {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        futures::future::join_all(handles).await;

        let mut rx = self.rx.lock().await;
        rx.close();
        let mut undelivered = Vec::new();
        while let Ok(item) = rx.try_recv() {
            undelivered.push(item);
        }
        info!(undelivered = undelivered.len(), "Worker pool stopped");
        undelivered
    }
}
