//! Inventory ledger client
//!
//! The ISSUE workflow books each box out of stock through the ledger before
//! recording it on the session. The ledger answers with its transaction id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("wbs-ss/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger URL not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One box leaving stock
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest<'a> {
    pub session_token: &'a str,
    pub document_number: Option<&'a str>,
    pub barcode: &'a str,
    pub item_code: &'a str,
    pub weight_kg: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueResponse {
    transaction_id: String,
}

/// Inventory ledger collaborator
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Book the box out of stock, returning the ledger transaction id
    async fn record_issue(&self, request: &IssueRequest<'_>) -> Result<String, LedgerError>;
}

pub struct HttpLedger {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpLedger {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl InventoryLedger for HttpLedger {
    async fn record_issue(&self, request: &IssueRequest<'_>) -> Result<String, LedgerError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LedgerError::ApiError(status.as_u16(), error_text));
        }

        let body: IssueResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::ParseError(e.to_string()))?;
        Ok(body.transaction_id)
    }
}

/// Stand-in when no ledger is configured; ISSUE sessions cannot book boxes
pub struct UnconfiguredLedger;

#[async_trait]
impl InventoryLedger for UnconfiguredLedger {
    async fn record_issue(&self, _request: &IssueRequest<'_>) -> Result<String, LedgerError> {
        Err(LedgerError::NotConfigured)
    }
}
