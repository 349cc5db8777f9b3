//! Outcome recording: the bounded-retry state machine.
//!
//! ```text
//!   pending ──ok──▶ sent
//!      │
//!      └──err──▶ retry ──ok──▶ sent
//!                  │ ▲
//!                  └─┘ err, attempts < max
//!                  │
//!                  └──err, attempts >= max──▶ failed
//! ```
//!
//! Every attempt increments `attempts` exactly once, whatever the result.
//! A `pending` row always passes through `retry` before it can fail.

use crate::DeliveryResult;
use chrono::{DateTime, Utc};
use outbox_store::{OutboxItem, OutboxStatus, OutboxStore, OutcomeUpdate, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Attempt ceiling and retry spacing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after which a failing item becomes `failed`.
    pub max_attempts: i32,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Cap on the retry delay.
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next claim of an item that has made `attempts` attempts.
    ///
    /// `base * 2^(attempts - 1)`, capped at `backoff_max`.
    pub fn backoff_for(&self, attempts: i32) -> Duration {
        let exponent = (attempts - 1).clamp(0, 20) as u32;
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Compute the row patch for one attempt.
pub fn plan_outcome(
    item: &OutboxItem,
    result: &DeliveryResult<String>,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> OutcomeUpdate {
    let attempts = item.attempts.saturating_add(1);

    match result {
        Ok(message_id) => OutcomeUpdate {
            status: OutboxStatus::Sent,
            attempts,
            last_error: None,
            sent_at: Some(now),
            failed_at: None,
            next_attempt_at: None,
            provider_message_id: Some(message_id.clone()),
        },
        Err(err) if attempts >= policy.max_attempts && item.status == OutboxStatus::Retry => {
            OutcomeUpdate {
                status: OutboxStatus::Failed,
                attempts,
                last_error: Some(err.to_string()),
                sent_at: None,
                failed_at: Some(now),
                next_attempt_at: None,
                provider_message_id: None,
            }
        }
        Err(err) => {
            let delay = chrono::Duration::from_std(policy.backoff_for(attempts))
                .unwrap_or_else(|_| chrono::Duration::hours(1));
            OutcomeUpdate {
                status: OutboxStatus::Retry,
                attempts,
                last_error: Some(err.to_string()),
                sent_at: None,
                failed_at: None,
                next_attempt_at: Some(now + delay),
                provider_message_id: None,
            }
        }
    }
}

/// Writes attempt outcomes to the store.
#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn OutboxStore>,
    policy: RetryPolicy,
}

impl Recorder {
    pub fn new(store: Arc<dyn OutboxStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Record one attempt and return the status written.
    pub async fn record(
        &self,
        item: &OutboxItem,
        result: &DeliveryResult<String>,
    ) -> StoreResult<OutboxStatus> {
        let update = plan_outcome(item, result, &self.policy, Utc::now());
        self.store.record(&item.id, &update).await?;

        match update.status {
            OutboxStatus::Sent => info!(
                item_id = %item.id,
                attempts = update.attempts,
                provider_message_id = update.provider_message_id.as_deref().unwrap_or_default(),
                "Email sent"
            ),
            OutboxStatus::Failed => warn!(
                item_id = %item.id,
                attempts = update.attempts,
                error = update.last_error.as_deref().unwrap_or_default(),
                "Email permanently failed"
            ),
            _ => warn!(
                item_id = %item.id,
                attempts = update.attempts,
                error = update.last_error.as_deref().unwrap_or_default(),
                "Email scheduled for retry"
            ),
        }

        Ok(update.status)
    }
}
