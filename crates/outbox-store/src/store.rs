//! Store abstraction used by the dispatcher.

use crate::{OutboxItem, OutcomeUpdate, StoreResult};
use async_trait::async_trait;

/// Claim and update access to the email outbox.
///
/// Implementations must guarantee that concurrent `claim` calls never return
/// overlapping rows. The dispatcher does no locking of its own.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Reserve up to `limit` rows that are `pending`, or `retry` and due.
    async fn claim(&self, limit: usize) -> StoreResult<Vec<OutboxItem>>;

    /// Write the outcome of one attempt to the row with the given id.
    async fn record(&self, id: &str, update: &OutcomeUpdate) -> StoreResult<()>;
}
