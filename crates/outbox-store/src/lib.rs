//! Email outbox rows and the stores that claim and update them.
//!
//! The outbox table is owned by the hosted database. This crate only knows
//! two operations on it:
//!
//! - **claim**: atomically reserve a bounded batch of `pending` or due `retry`
//!   rows for one invocation
//! - **record**: write the outcome of one delivery attempt back to a row
//!
//! [`SupabaseOutboxStore`] performs both over PostgREST. [`InMemoryOutboxStore`]
//! keeps an explicit lease set and is used by tests and local dry runs.

mod error;
mod memory;
mod models;
mod store;
mod supabase;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryOutboxStore;
pub use models::{OutboxItem, OutboxStatus, OutcomeUpdate};
pub use store::OutboxStore;
pub use supabase::{SupabaseOutboxStore, CLAIM_FUNCTION, OUTBOX_TABLE};
