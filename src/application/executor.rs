//! # Sequential Executor
//!
//! A single worker task draining an unbounded FIFO of dispatch requests.
//! Exactly one job runs at a time, whatever its type; the next job is popped
//! only after the previous one returned, failed or panicked.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Work performed for each submitted id.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self, id: &str) -> Result<()>;

    /// Last-resort hook after `run` returned an error or panicked.
    fn recover(&self, _id: &str, _reason: &str) {}
}

enum Job {
    Run(String),
    Barrier(oneshot::Sender<()>),
}

pub struct SequentialExecutor {
    tx: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

impl SequentialExecutor {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(handler: Arc<dyn JobHandler>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::work(handler, rx));
        Self { tx, worker }
    }

    async fn work(handler: Arc<dyn JobHandler>, mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.recv().await {
            let id = match job {
                Job::Run(id) => id,
                Job::Barrier(done) => {
                    let _ = done.send(());
                    continue;
                }
            };

            let outcome = AssertUnwindSafe(handler.run(&id)).catch_unwind().await;
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };

            tracing::error!("Action {} failed: {}", id, reason);
            handler.recover(&id, &reason);
        }
        tracing::debug!("Executor queue closed");
    }

    /// Appends an action to the queue.
    pub fn submit(&self, id: impl Into<String>) -> Result<()> {
        self.tx
            .send(Job::Run(id.into()))
            .map_err(|_| anyhow!("Executor worker has stopped"))
    }

    /// Resolves once every job submitted before this call has finished.
    pub async fn drain(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Job::Barrier(done_tx))
            .map_err(|_| anyhow!("Executor worker has stopped"))?;
        done_rx.await.map_err(|_| anyhow!("Executor worker has stopped"))
    }
}

impl Drop for SequentialExecutor {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
