//! Email provider sender.

use crate::{DeliveryError, DeliveryResult, OutboxResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A validated message ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// One delivery call to an email provider.
///
/// Returns the provider-assigned message id. Implementations make exactly
/// one request per call and never retry.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> DeliveryResult<String>;
}

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Base URL for the provider API.
    pub api_url: String,
    /// `From` header used for every message.
    pub from: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com".to_string(),
            from: "no-reply@example.com".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Request payload for sending one email.
#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Response from the provider.
#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Sender for the Resend REST API.
pub struct ResendSender {
    config: SenderConfig,
    client: Client,
    api_key: String,
}

impl ResendSender {
    /// Create a new sender.
    pub fn new(config: SenderConfig, api_key: &str) -> OutboxResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            api_key: api_key.to_string(),
        })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn send(&self, message: &EmailMessage) -> DeliveryResult<String> {
        let url = self.emails_url();

        let request = SendEmailRequest {
            from: &self.config.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        debug!(url = %url, to = %message.to, "Sending email");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let result: SendEmailResponse = response.json().await?;

        match result.id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(DeliveryError::MissingMessageId),
        }
    }
}

impl std::fmt::Debug for ResendSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendSender")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
