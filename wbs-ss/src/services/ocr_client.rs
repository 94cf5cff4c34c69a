//! Label OCR service client
//!
//! The extraction service takes a public image URL and answers with the
//! product name, weight and dates it could read off the label. Calls are made
//! from a background task (see [`crate::services::OcrDispatcher`]); the scan
//! request that triggered them never waits on the answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use wbs_common::models::OcrData;

const USER_AGENT: &str = concat!("wbs-ss/", env!("CARGO_PKG_VERSION"));

/// OCR client errors
#[derive(Debug, Error)]
pub enum OcrError {
    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Service answered with a non-success status
    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Service reported that extraction failed
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Failed to parse response JSON
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No answer within the configured timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl OcrError {
    /// Short tag recorded on the scan entry
    pub fn tag(&self) -> String {
        match self {
            OcrError::Timeout(_) => "ocr_timeout".to_string(),
            other => format!("ocr_error: {}", other),
        }
    }
}

/// Label extraction collaborator
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Extract label fields from the image at `image_url`
    ///
    /// `correlation_id` identifies the scan entry in the service's logs.
    async fn extract(&self, image_url: &str, correlation_id: &str) -> Result<OcrData, OcrError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest<'a> {
    image_url: &'a str,
    correlation_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: OcrData,
}

fn default_success() -> bool {
    true
}

/// HTTP client for the OCR service
pub struct HttpOcrClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpOcrClient {
    /// Create new OCR client for `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OcrError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    fn send_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::Timeout(self.timeout)
        } else {
            OcrError::NetworkError(e.to_string())
        }
    }
}

#[async_trait]
impl OcrService for HttpOcrClient {
    async fn extract(&self, image_url: &str, correlation_id: &str) -> Result<OcrData, OcrError> {
        tracing::debug!(correlation_id, image_url, "Requesting label extraction");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ExtractRequest {
                image_url,
                correlation_id,
            })
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(status.as_u16(), error_text));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| OcrError::ParseError(e.to_string()))?;

        if !body.success {
            return Err(OcrError::ExtractionFailed(
                body.error.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        tracing::info!(
            correlation_id,
            has_name = body.data.name().is_some(),
            has_weight = body.data.weight().is_some(),
            "Label extraction successful"
        );

        Ok(body.data)
    }
}
