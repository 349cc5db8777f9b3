//! Supabase REST implementation of the outbox store.

use crate::{OutboxItem, OutboxStore, OutcomeUpdate, StoreError, StoreResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// Table holding the email outbox rows.
pub const OUTBOX_TABLE: &str = "email_outbox";

/// Database procedure that leases a batch of rows.
///
/// Contract: selects up to `p_limit` rows with `status = 'pending'`, or
/// `status = 'retry'` and `next_attempt_at <= now()`, using
/// `FOR UPDATE SKIP LOCKED`, stamps `claimed_at`, and returns them. Rows with
/// a fresh `claimed_at` are skipped by later calls until the lease expires.
pub const CLAIM_FUNCTION: &str = "claim_email_outbox";

#[derive(Debug, Serialize)]
struct ClaimRequest {
    p_limit: usize,
}

/// Outbox store backed by Supabase PostgREST.
#[derive(Clone)]
pub struct SupabaseOutboxStore {
    http_client: reqwest::Client,
    api_url: String,
    service_role_key: String,
}

impl SupabaseOutboxStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `service_role_key` - Key with rights to call the claim procedure and patch rows
    /// * `timeout` - Applied to every request
    pub fn new(
        api_url: impl Into<String>,
        service_role_key: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        })
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Build the RPC URL for a database function.
    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_url, function)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
    }

    /// Check HTTP response for errors.
    async fn check_response(&self, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Supabase request failed");
            return Err(StoreError::Supabase {
                status,
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl OutboxStore for SupabaseOutboxStore {
    async fn claim(&self, limit: usize) -> StoreResult<Vec<OutboxItem>> {
        let url = self.rpc_url(CLAIM_FUNCTION);

        debug!(limit, "Claiming outbox batch");

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&ClaimRequest { p_limit: limit })
            .send()
            .await?;

        let response = self.check_response(response).await?;
        let body = response.text().await?;
        let items: Vec<OutboxItem> = serde_json::from_str(&body)?;

        debug!(count = items.len(), "Claimed outbox batch");
        Ok(items)
    }

    async fn record(&self, id: &str, update: &OutcomeUpdate) -> StoreResult<()> {
        let url = self.rest_url(OUTBOX_TABLE);

        debug!(item_id = %id, status = %update.status, attempts = update.attempts, "Recording outcome");

        let response = self
            .authorized(self.http_client.patch(&url))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(update)
            .send()
            .await?;

        self.check_response(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for SupabaseOutboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseOutboxStore")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
