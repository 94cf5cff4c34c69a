//! Image hosting client
//!
//! Label photos are pushed to the image host before the scan is appended, so
//! the OCR service can later fetch them by public URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("wbs-ss/", env!("CARGO_PKG_VERSION"));

/// Image host errors
#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("Image host URL not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Where an uploaded image ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

/// Image hosting collaborator
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `bytes` under the destination hint `folder`
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<UploadedImage, ImageHostError>;
}

/// HTTP image host taking the raw image as the request body
pub struct HttpImageHost {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpImageHost {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ImageHostError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ImageHostError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<UploadedImage, ImageHostError> {
        let size = bytes.len();
        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("folder", folder)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ImageHostError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImageHostError::ApiError(status.as_u16(), error_text));
        }

        let uploaded: UploadedImage = response
            .json()
            .await
            .map_err(|e| ImageHostError::ParseError(e.to_string()))?;

        tracing::debug!(folder, size, public_id = %uploaded.public_id, "Image uploaded");
        Ok(uploaded)
    }
}

/// Stand-in when no image host is configured
pub struct UnconfiguredImageHost;

#[async_trait]
impl ImageHost for UnconfiguredImageHost {
    async fn upload(&self, _bytes: Vec<u8>, _folder: &str) -> Result<UploadedImage, ImageHostError> {
        Err(ImageHostError::NotConfigured)
    }
}
