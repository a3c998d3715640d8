//! Batch runner: drains a batch's queued items through a fixed-size worker pool.
//!
//! A run first claims the batch, so a batch has at most one live runner. Item
//! ids go into an mpsc channel; exactly `concurrency` tasks share the receiver
//! and run each item through the linear retry policy. Workers check in on the
//! batch before each item and stop once it is no longer `running`. Item failures
//! are absorbed per item. Only orchestration failures fail the batch outright.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::processor::{ItemOutcome, ProcessError};
use super::retry::{retry, RetryPolicy};
use crate::config::BatchDefaults;
use crate::models::batch::{Batch, BatchStatus, ItemCounts};
use crate::store::{BatchStore, StoreError};

#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Runs one attempt for the item and leaves it `done` or `failed`.
    async fn process(&self, item_id: Uuid) -> Result<ItemOutcome, ProcessError>;
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("Batch {id} is already {status}")]
    AlreadyFinished { id: Uuid, status: BatchStatus },

    #[error("Batch {0} is already being run")]
    AlreadyRunning(Uuid),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("worker: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Requeue `processing` items untouched for this long before starting.
    pub stale_after: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        BatchDefaults::default().into()
    }
}

impl From<BatchDefaults> for RunOptions {
    fn from(defaults: BatchDefaults) -> Self {
        Self {
            concurrency: defaults.concurrency,
            max_retries: defaults.max_retries,
            retry_delay: defaults.retry_delay,
            stale_after: None,
        }
    }
}

impl RunOptions {
    fn policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_retries, self.retry_delay)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub total: i32,
    pub processed: i32,
    pub failed: i32,
    pub requeued: u64,
}

impl BatchSummary {
    fn new(batch: &Batch, requeued: u64) -> Self {
        Self {
            batch_id: batch.id,
            status: batch.status,
            total: batch.total,
            processed: batch.processed,
            failed: batch.failed,
            requeued,
        }
    }
}

/// `failed` only when nothing succeeded and something failed; partial success is `completed`.
pub fn final_status(counts: &ItemCounts) -> BatchStatus {
    if counts.done == 0 && counts.failed > 0 {
        BatchStatus::Failed
    } else {
        BatchStatus::Completed
    }
}

/// Rejects unknown or finished batches before any work is scheduled.
pub async fn check_runnable(store: &dyn BatchStore, batch_id: Uuid) -> Result<Batch, RunError> {
    let batch = store
        .get_batch(batch_id)
        .await?
        .ok_or(RunError::BatchNotFound(batch_id))?;
    if batch.status.is_terminal() {
        return Err(RunError::AlreadyFinished {
            id: batch_id,
            status: batch.status,
        });
    }
    Ok(batch)
}

/// Takes ownership of the batch for one run. Only one runner holds a batch at a
/// time; with `stale_after` a runner that stopped checking in can be replaced.
pub async fn claim_batch(
    store: &dyn BatchStore,
    batch_id: Uuid,
    stale_after: Option<Duration>,
) -> Result<Batch, RunError> {
    check_runnable(store, batch_id).await?;
    let batch = store
        .claim_batch(batch_id, stale_after)
        .await?
        .ok_or(RunError::AlreadyRunning(batch_id))?;
    info!("Batch {batch_id}: claimed for a run");
    Ok(batch)
}

pub async fn run_batch(
    store: Arc<dyn BatchStore>,
    processor: Arc<dyn ItemProcessor>,
    batch_id: Uuid,
    options: RunOptions,
) -> Result<BatchSummary, RunError> {
    claim_batch(store.as_ref(), batch_id, options.stale_after).await?;
    run_claimed(store, processor, batch_id, options).await
}

/// Runs a batch already claimed through [`claim_batch`].
pub async fn run_claimed(
    store: Arc<dyn BatchStore>,
    processor: Arc<dyn ItemProcessor>,
    batch_id: Uuid,
    options: RunOptions,
) -> Result<BatchSummary, RunError> {
    info!(
        "Batch {batch_id}: running (concurrency={}, max_retries={}, retry_delay={:?})",
        options.concurrency, options.max_retries, options.retry_delay
    );

    match drive(&store, &processor, batch_id, &options).await {
        Ok(summary) => {
            info!(
                "Batch {batch_id}: {} (processed={}, failed={}, total={})",
                summary.status, summary.processed, summary.failed, summary.total
            );
            Ok(summary)
        }
        Err(e) => {
            error!("Batch {batch_id}: run aborted: {e}");
            if let Err(mark_err) = store.set_batch_status(batch_id, BatchStatus::Failed).await {
                error!("Batch {batch_id}: could not mark failed: {mark_err}");
            }
            Err(e)
        }
    }
}

async fn drive(
    store: &Arc<dyn BatchStore>,
    processor: &Arc<dyn ItemProcessor>,
    batch_id: Uuid,
    options: &RunOptions,
) -> Result<BatchSummary, RunError> {
    let requeued = match options.stale_after {
        Some(after) => {
            let n = store.requeue_stale(batch_id, after).await?;
            if n > 0 {
                warn!("Batch {batch_id}: requeued {n} stale processing items");
            }
            n
        }
        None => 0,
    };

    let queued = store.queued_items(batch_id).await?;
    debug!("Batch {batch_id}: {} queued items", queued.len());

    let (tx, rx) = mpsc::channel(queued.len().max(1));
    for item in &queued {
        tx.send(item.id)
            .await
            .map_err(|_| RunError::Worker("item queue closed while filling".to_string()))?;
    }
    drop(tx);

    let rx = Arc::new(Mutex::new(rx));
    let policy = options.policy();
    let mut workers = JoinSet::new();
    for worker in 0..options.concurrency.max(1) {
        workers.spawn(work(
            worker,
            store.clone(),
            processor.clone(),
            rx.clone(),
            batch_id,
            policy,
        ));
    }

    while let Some(joined) = workers.join_next().await {
        joined.map_err(|e| RunError::Worker(format!("worker task failed: {e}")))??;
    }

    let counts = store.count_items(batch_id).await?;
    let status = match store.get_batch(batch_id).await? {
        Some(batch) if batch.status == BatchStatus::Canceled => BatchStatus::Canceled,
        Some(_) => final_status(&counts),
        None => return Err(RunError::BatchNotFound(batch_id)),
    };
    let batch = store.finalize_batch(batch_id, counts, status).await?;

    Ok(BatchSummary::new(&batch, requeued))
}


async fn work(
    worker: usize,
    store: Arc<dyn BatchStore>,
    processor: Arc<dyn ItemProcessor>,
    queue: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    batch_id: Uuid,
    policy: RetryPolicy,
) -> Result<(), RunError> {
    loop {
        if !store.heartbeat_batch(batch_id).await? {
            info!("Batch {batch_id}: worker {worker} stopping, batch no longer running");
            return Ok(());
        }

        // Hold the lock only while receiving.
        let next = queue.lock().await.recv().await;
        let Some(item_id) = next else {
            debug!("Batch {batch_id}: worker {worker} drained the queue");
            return Ok(());
        };

        let result = retry(&policy, |attempt| {
            debug!("Worker {worker}: item {item_id} attempt {attempt}");
            processor.process(item_id)
        })
        .await;

        match result {
            Ok(outcome) => debug!(
                "Worker {worker}: item {item_id} finished as {:?}",
                outcome.item.status
            ),
            Err(e) => warn!(
                "Worker {worker}: item {item_id} failed after {} attempts: {e}",
                policy.max_attempts
            ),
        }
    }
}

/// Non-terminal batch → `canceled`. Running workers stop before their next item.
pub async fn cancel_batch(store: &dyn BatchStore, batch_id: Uuid) -> Result<Batch, RunError> {
    check_runnable(store, batch_id).await?;
    store.set_batch_status(batch_id, BatchStatus::Canceled).await?;
    info!("Batch {batch_id}: canceled");
    store
        .get_batch(batch_id)
        .await?
        .ok_or(RunError::BatchNotFound(batch_id))
}
