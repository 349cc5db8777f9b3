//! In-memory outbox store with explicit leases.

use crate::{OutboxItem, OutboxStore, OutcomeUpdate, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    /// Rows in insertion order.
    rows: Vec<OutboxItem>,
    /// Ids currently claimed and not yet recorded.
    leased: HashSet<String>,
    claim_calls: usize,
    record_calls: usize,
    fail_claims: Option<String>,
    fail_records: HashSet<String>,
}

/// Outbox store held in process memory.
///
/// A claim leases the rows it returns; the lease is released when an outcome
/// is recorded. Concurrent claims therefore never overlap.
#[derive(Default)]
pub struct InMemoryOutboxStore {
    state: Mutex<MemoryState>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with rows.
    pub fn with_items(items: impl IntoIterator<Item = OutboxItem>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows: items.into_iter().collect(),
                ..Default::default()
            }),
        }
    }

    /// Current copy of the row with the given id.
    pub async fn get(&self, id: &str) -> Option<OutboxItem> {
        self.state
            .lock()
            .await
            .rows
            .iter()
            .find(|row| row.id == id)
            .cloned()
    }

    /// Current copy of every row.
    pub async fn items(&self) -> Vec<OutboxItem> {
        self.state.lock().await.rows.clone()
    }

    /// Number of ids still leased.
    pub async fn leased_count(&self) -> usize {
        self.state.lock().await.leased.len()
    }

    /// Number of `claim` calls received.
    pub async fn claim_calls(&self) -> usize {
        self.state.lock().await.claim_calls
    }

    /// Number of `record` calls received.
    pub async fn record_calls(&self) -> usize {
        self.state.lock().await.record_calls
    }

    /// Make every following claim fail with `message`.
    pub async fn fail_claims_with(&self, message: impl Into<String>) {
        self.state.lock().await.fail_claims = Some(message.into());
    }

    /// Make every following record for `id` fail.
    pub async fn fail_records_for(&self, id: impl Into<String>) {
        self.state.lock().await.fail_records.insert(id.into());
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn claim(&self, limit: usize) -> StoreResult<Vec<OutboxItem>> {
        let mut state = self.state.lock().await;
        state.claim_calls += 1;

        if let Some(message) = &state.fail_claims {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let now = Utc::now();
        let claimed: Vec<OutboxItem> = state
            .rows
            .iter()
            .filter(|row| row.is_due(now) && !state.leased.contains(&row.id))
            .take(limit)
            .cloned()
            .collect();

        for item in &claimed {
            state.leased.insert(item.id.clone());
        }

        debug!(count = claimed.len(), limit, "Claimed in-memory batch");
        Ok(claimed)
    }

    async fn record(&self, id: &str, update: &OutcomeUpdate) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.record_calls += 1;

        if state.fail_records.contains(id) {
            return Err(StoreError::Unavailable(format!("record rejected for {id}")));
        }

        let row = state
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !row.status.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: row.status,
                to: update.status,
            });
        }

        update.apply_to(row);
        state.leased.remove(id);
        Ok(())
    }
}
