//! Completion webhook
//!
//! Delivers the session summary to the downstream booking system. Delivery
//! counts as confirmed only on a 2xx answer; anything else leaves the session
//! open so the client can retry finalization.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use wbs_common::models::SessionSummary;

const USER_AGENT: &str = concat!("wbs-ss/", env!("CARGO_PKG_VERSION"));

/// Event name carried in every completion payload
pub const SESSION_COMPLETED_EVENT: &str = "session.completed";

/// Webhook delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No webhook target configured
    #[error("Webhook URL not configured")]
    NotConfigured,

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Receiver answered with a non-success status
    #[error("Receiver returned {0}: {1}")]
    Rejected(u16, String),
}

/// Outbound completion notification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub event: &'static str,
    pub summary: &'a SessionSummary,
}

impl<'a> WebhookPayload<'a> {
    pub fn completed(summary: &'a SessionSummary) -> Self {
        Self {
            event: SESSION_COMPLETED_EVENT,
            summary,
        }
    }
}

/// Completion notification collaborator
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Deliver `payload`, returning only once the receiver confirmed it
    async fn deliver(&self, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError>;
}

/// HTTP JSON webhook
pub struct HttpWebhook {
    http_client: reqwest::Client,
    url: String,
}

impl HttpWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhook {
    async fn deliver(&self, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(status.as_u16(), error_text));
        }

        tracing::info!(
            token = %payload.summary.token,
            status = status.as_u16(),
            "Completion webhook delivered"
        );
        Ok(())
    }
}

/// Stand-in when no webhook is configured; every delivery fails
///
/// Sessions can then never be marked delivered, which is the only safe
/// reading of a missing target.
pub struct UnconfiguredWebhook;

#[async_trait]
impl WebhookSender for UnconfiguredWebhook {
    async fn deliver(&self, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError> {
        tracing::warn!(
            token = %payload.summary.token,
            "Finalize attempted but no webhook URL is configured"
        );
        Err(DeliveryError::NotConfigured)
    }
}
