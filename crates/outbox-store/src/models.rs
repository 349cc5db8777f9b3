//! Outbox row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Outbox item status.
///
/// `Sent` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    #[default]
    Pending,
    Sent,
    Retry,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Retry => "retry",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Allowed lifecycle moves. A row only fails after at least one retry.
    pub fn can_transition_to(&self, next: OutboxStatus) -> bool {
        use OutboxStatus::*;
        matches!(
            (*self, next),
            (Pending, Sent | Retry) | (Retry, Sent | Retry | Failed)
        )
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read `null` as the type's default.
///
/// A row with a null column still decodes; validation then rejects it as a
/// failed attempt instead of failing the whole claim.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of the email outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: String,
    #[serde(
        rename = "to_email",
        alias = "recipient",
        default,
        deserialize_with = "null_as_default"
    )]
    pub recipient: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attempts: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: OutboxStatus,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl OutboxItem {
    /// A fresh `pending` row with no attempts.
    pub fn pending(
        id: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            attempts: 0,
            status: OutboxStatus::Pending,
            last_error: None,
            created_at: Some(Utc::now()),
            next_attempt_at: None,
        }
    }

    /// Whether the row is eligible for a claim at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::Retry => self.next_attempt_at.map_or(true, |at| at <= now),
            OutboxStatus::Sent | OutboxStatus::Failed => false,
        }
    }
}

/// Row patch written after one delivery attempt.
///
/// `last_error` is always serialized so a successful retry clears it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeUpdate {
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
}

impl OutcomeUpdate {
    /// Apply this patch to an in-memory copy of the row.
    pub fn apply_to(&self, item: &mut OutboxItem) {
        item.status = self.status;
        item.attempts = self.attempts;
        item.last_error = self.last_error.clone();
        item.next_attempt_at = self.next_attempt_at;
    }
}
