//! Shared work queue drained by the dispatch workers.

use outbox_store::OutboxItem;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Largest batch a single invocation may claim.
pub const MAX_CLAIM_LIMIT: usize = 20;

/// Batch size used when the trigger does not ask for one.
pub const DEFAULT_CLAIM_LIMIT: usize = 10;

/// Upper bound on concurrent workers per invocation.
pub const MAX_WORKERS: usize = 3;

/// Clamp a requested batch size to `[1, MAX_CLAIM_LIMIT]`.
///
/// `None` yields `DEFAULT_CLAIM_LIMIT`.
pub fn clamp_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) => n.clamp(1, MAX_CLAIM_LIMIT as i64) as usize,
        None => DEFAULT_CLAIM_LIMIT,
    }
}

/// Number of workers to start for a batch: never more than the batch holds.
pub fn worker_count_for(batch_len: usize, configured: usize) -> usize {
    configured.max(1).min(batch_len)
}

/// FIFO of claimed items. Each item is handed out exactly once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<OutboxItem>>,
}

impl WorkQueue {
    /// Build a queue holding the claimed batch.
    pub fn from_batch(batch: Vec<OutboxItem>) -> Self {
        Self {
            items: Mutex::new(batch.into()),
        }
    }

    /// Take the next item, if any.
    pub async fn pop(&self) -> Option<OutboxItem> {
        self.items.lock().await.pop_front()
    }

    /// Number of items not yet taken.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn batch(count: usize) -> Vec<OutboxItem> {
        (1..=count)
            .map(|i| OutboxItem::pending(format!("row-{i}"), "a@b.com", "s", "b"))
            .collect()
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_CLAIM_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-4)), 1);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(20)), 20);
        assert_eq!(clamp_limit(Some(500)), MAX_CLAIM_LIMIT);
    }

    #[test]
    fn test_worker_count_for() {
        assert_eq!(worker_count_for(10, MAX_WORKERS), 3);
        assert_eq!(worker_count_for(2, MAX_WORKERS), 2);
        assert_eq!(worker_count_for(1, MAX_WORKERS), 1);
        assert_eq!(worker_count_for(0, MAX_WORKERS), 0);
        assert_eq!(worker_count_for(5, 0), 1);
    }

    #[tokio::test]
    async fn test_pop_is_fifo() {
        let queue = WorkQueue::from_batch(batch(3));
        assert_eq!(queue.len().await, 3);
        assert_eq!(queue.pop().await.unwrap().id, "row-1");
        assert_eq!(queue.pop().await.unwrap().id, "row-2");
        assert_eq!(queue.pop().await.unwrap().id, "row-3");
        assert!(queue.pop().await.is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_pops_hand_out_each_item_once() {
        let queue = Arc::new(WorkQueue::from_batch(batch(50)));

        let mut handles = Vec::new();
        for _ in 0..MAX_WORKERS {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(item) = queue.pop().await {
                    taken.push(item.id);
                    tokio::task::yield_now().await;
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 50);
        assert_eq!(unique.len(), 50);
    }
}
