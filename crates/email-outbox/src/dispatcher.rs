//! Dispatcher: claim a batch, drain it with a worker pool, record outcomes.

use crate::{
    validate_item, worker_count_for, EmailSender, OutboxResult, Recorder, RetryPolicy, WorkQueue,
    MAX_CLAIM_LIMIT,
};
use outbox_store::{OutboxItem, OutboxStatus, OutboxStore};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Counts for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Rows returned by the claim.
    pub claimed: usize,
    /// Rows taken off the queue by a worker.
    pub processed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Rows whose outcome could not be written back.
    pub record_errors: usize,
    /// Ids in the order workers took them.
    pub processed_ids: Vec<String>,
}

impl DispatchReport {
    fn merge(&mut self, other: DispatchReport) {
        self.processed += other.processed;
        self.sent += other.sent;
        self.retried += other.retried;
        self.failed += other.failed;
        self.record_errors += other.record_errors;
        self.processed_ids.extend(other.processed_ids);
    }
}

/// Runs one outbox invocation at a time; safe to share across tasks.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn OutboxStore>,
    sender: Arc<dyn EmailSender>,
    recorder: Recorder,
    worker_count: usize,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `worker_count` caps the pool; a batch never gets more workers than items.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        sender: Arc<dyn EmailSender>,
        policy: RetryPolicy,
        worker_count: usize,
    ) -> Self {
        Self {
            recorder: Recorder::new(store.clone(), policy),
            store,
            sender,
            worker_count: worker_count.max(1),
        }
    }

    /// Claim up to `limit` rows and process them.
    ///
    /// A claim failure aborts the invocation before anything is processed.
    pub async fn run(&self, limit: usize) -> OutboxResult<DispatchReport> {
        let limit = limit.clamp(1, MAX_CLAIM_LIMIT);

        let mut batch = self.store.claim(limit).await?;
        if batch.len() > limit {
            warn!(
                claimed = batch.len(),
                limit,
                "Claim returned more rows than requested, processing only the limit"
            );
            batch.truncate(limit);
        }

        info!(claimed = batch.len(), limit, "Claimed outbox batch");

        let report = self.dispatch(batch).await;

        info!(
            processed = report.processed,
            sent = report.sent,
            retried = report.retried,
            failed = report.failed,
            record_errors = report.record_errors,
            "Outbox invocation finished"
        );

        Ok(report)
    }

    /// Process an already-claimed batch with `min(worker_count, batch)` workers.
    pub async fn dispatch(&self, batch: Vec<OutboxItem>) -> DispatchReport {
        let mut report = DispatchReport {
            claimed: batch.len(),
            ..Default::default()
        };

        let workers = worker_count_for(batch.len(), self.worker_count);
        if workers == 0 {
            return report;
        }

        let queue = Arc::new(WorkQueue::from_batch(batch));
        let mut tasks = JoinSet::new();

        for worker_id in 0..workers {
            let queue = queue.clone();
            let sender = self.sender.clone();
            let recorder = self.recorder.clone();
            tasks.spawn(run_worker(worker_id, queue, sender, recorder));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(tally) => report.merge(tally),
                Err(e) => error!(error = %e, "Dispatch worker panicked"),
            }
        }

        report
    }
}

/// Drain the queue until empty. One delivery call per valid item.
async fn run_worker(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    sender: Arc<dyn EmailSender>,
    recorder: Recorder,
) -> DispatchReport {
    let mut tally = DispatchReport::default();

    while let Some(item) = queue.pop().await {
        tally.processed += 1;
        tally.processed_ids.push(item.id.clone());

        debug!(worker_id, item_id = %item.id, attempts = item.attempts, "Processing item");

        let result = match validate_item(&item) {
            Ok(message) => sender.send(&message).await,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Item failed validation");
                Err(e)
            }
        };

        match recorder.record(&item, &result).await {
            Ok(OutboxStatus::Sent) => tally.sent += 1,
            Ok(OutboxStatus::Failed) => tally.failed += 1,
            Ok(_) => tally.retried += 1,
            Err(e) => {
                tally.record_errors += 1;
                error!(item_id = %item.id, error = %e, "Failed to record outcome");
            }
        }
    }

    tally
}
