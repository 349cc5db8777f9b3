//! Email outbox dispatcher.
//!
//! One invocation:
//! 1. claims a bounded batch of rows through an [`OutboxStore`]
//! 2. drains it with a small pool of workers sharing a [`WorkQueue`]
//! 3. sends each valid row once through an [`EmailSender`]
//! 4. records `sent`, `retry` or `failed` on the row via the [`Recorder`]
//!
//! Retries never happen inside an invocation; a `retry` row is picked up by a
//! later claim once it is due.

mod dispatcher;
mod error;
mod queue;
mod recorder;
mod sender;
mod validation;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{DeliveryError, DeliveryResult, OutboxError, OutboxResult};
pub use outbox_store::{OutboxItem, OutboxStatus, OutboxStore, OutcomeUpdate};
pub use queue::{
    clamp_limit, worker_count_for, WorkQueue, DEFAULT_CLAIM_LIMIT, MAX_CLAIM_LIMIT, MAX_WORKERS,
};
pub use recorder::{plan_outcome, Recorder, RetryPolicy};
pub use sender::{EmailMessage, EmailSender, ResendSender, SenderConfig};
pub use validation::{is_valid_recipient, validate_item};
