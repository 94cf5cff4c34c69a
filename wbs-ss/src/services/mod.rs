//! External collaborators
//!
//! Each collaborator sits behind an `async_trait` trait with a reqwest-based
//! HTTP implementation, plus an `Unconfigured*` stand-in used when its URL is
//! not set.

pub mod image_host;
pub mod ledger;
pub mod ocr_client;
pub mod ocr_dispatcher;
pub mod webhook;

pub use image_host::{HttpImageHost, ImageHost, ImageHostError, UnconfiguredImageHost, UploadedImage};
pub use ledger::{HttpLedger, InventoryLedger, IssueRequest, LedgerError, UnconfiguredLedger};
pub use ocr_client::{HttpOcrClient, OcrError, OcrService};
pub use ocr_dispatcher::OcrDispatcher;
pub use webhook::{DeliveryError, HttpWebhook, UnconfiguredWebhook, WebhookPayload, WebhookSender};
