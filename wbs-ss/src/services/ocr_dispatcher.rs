//! Fire-and-forget OCR dispatch
//!
//! An accepted scan with an image spawns one task here. The task owns the
//! whole OCR round trip and reports back through the engine like any other
//! caller: [`SessionEngine::merge_ocr_result`] on success,
//! [`SessionEngine::mark_ocr_failed`] on error or timeout. The request that
//! appended the scan has long returned by then.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use wbs_common::Error;

use super::ocr_client::{OcrError, OcrService};
use crate::engine::SessionEngine;

#[derive(Clone)]
pub struct OcrDispatcher {
    engine: SessionEngine,
    ocr: Arc<dyn OcrService>,
    timeout: Duration,
}

impl OcrDispatcher {
    pub fn new(engine: SessionEngine, ocr: Arc<dyn OcrService>, timeout: Duration) -> Self {
        Self {
            engine,
            ocr,
            timeout,
        }
    }

    /// Start OCR for one entry in the background
    pub fn dispatch(&self, token: String, barcode: String, image_url: String) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run(&token, &barcode, &image_url).await;
        })
    }

    /// Run OCR for one entry and record the outcome on the session
    pub async fn run(&self, token: &str, barcode: &str, image_url: &str) {
        let correlation_id = format!("{}:{}", token, barcode);

        let extracted = match tokio::time::timeout(
            self.timeout,
            self.ocr.extract(image_url, &correlation_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OcrError::Timeout(self.timeout)),
        };

        let recorded = match extracted {
            Ok(data) => self
                .engine
                .merge_ocr_result(token, barcode, data)
                .await
                .map(|_| ()),
            Err(e) => {
                tracing::warn!(token, barcode, error = %e, "OCR extraction failed");
                self.engine
                    .mark_ocr_failed(token, barcode, &e.tag())
                    .await
                    .map(|_| ())
            }
        };

        match recorded {
            Ok(()) => {}
            Err(Error::NotFound(_)) | Err(Error::InvalidState(_)) => {
                tracing::debug!(token, barcode, "Session gone or closed before OCR finished");
            }
            Err(e) => {
                // The watchdog sweep still fails the entry if it stays pending.
                tracing::error!(token, barcode, error = %e, "Failed to record OCR outcome");
            }
        }
    }
}
