//! wbs-ss library interface
//!
//! The scan session service: HTTP API over the session engine, plus the
//! collaborator clients it calls out to. Exposed as a library so integration
//! tests can build the router against in-memory collaborators.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wbs_common::config::StoreConfig;
use wbs_common::{Error, MemoryStore, RecordStore};

use crate::config::ServiceConfig;
use crate::engine::SessionEngine;
use crate::services::{
    HttpImageHost, HttpLedger, HttpOcrClient, HttpWebhook, ImageHost, InventoryLedger,
    OcrDispatcher, UnconfiguredImageHost, UnconfiguredLedger, UnconfiguredWebhook, WebhookSender,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: SessionEngine,
    /// Present when an OCR endpoint is configured
    pub ocr: Option<OcrDispatcher>,
    pub images: Arc<dyn ImageHost>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        engine: SessionEngine,
        ocr: Option<OcrDispatcher>,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            engine,
            ocr,
            images,
            startup_time: Utc::now(),
        }
    }
}

/// Open the record store named by `store`
pub async fn open_store(store: &StoreConfig) -> wbs_common::Result<Arc<dyn RecordStore>> {
    match store {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory record store; sessions are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Sqlite { path } => {
            let sqlite = wbs_common::store::SqliteStore::open(path).await?;
            let purged = sqlite.purge_expired().await?;
            tracing::info!(path = %path.display(), purged, "Opened SQLite record store");
            Ok(Arc::new(sqlite))
        }
    }
}

/// Wire the store, collaborators and engine described by `config`
pub async fn build_state(config: &ServiceConfig) -> wbs_common::Result<AppState> {
    let store = open_store(&config.store).await?;

    let webhook: Arc<dyn WebhookSender> = match &config.webhook_url {
        Some(url) => Arc::new(
            HttpWebhook::new(url.clone(), config.webhook_timeout)
                .map_err(|e| Error::Config(format!("webhook client: {}", e)))?,
        ),
        None => {
            tracing::warn!("No webhook URL configured; sessions cannot be finalized");
            Arc::new(UnconfiguredWebhook)
        }
    };

    let ledger: Arc<dyn InventoryLedger> = match &config.ledger_url {
        Some(url) => Arc::new(
            HttpLedger::new(url.clone(), config.ledger_timeout)
                .map_err(|e| Error::Config(format!("ledger client: {}", e)))?,
        ),
        None => Arc::new(UnconfiguredLedger),
    };

    let images: Arc<dyn ImageHost> = match &config.image_host_url {
        Some(url) => Arc::new(
            HttpImageHost::new(url.clone(), config.image_host_timeout)
                .map_err(|e| Error::Config(format!("image host client: {}", e)))?,
        ),
        None => Arc::new(UnconfiguredImageHost),
    };

    let engine = SessionEngine::new(store, webhook, ledger, config.engine_settings());

    let ocr = match &config.ocr_url {
        Some(url) => {
            let client = HttpOcrClient::new(url.clone(), config.ocr_timeout)
                .map_err(|e| Error::Config(format!("OCR client: {}", e)))?;
            Some(OcrDispatcher::new(
                engine.clone(),
                Arc::new(client),
                config.ocr_timeout,
            ))
        }
        None => {
            tracing::warn!("No OCR URL configured; scans stay pending until swept or resolved");
            None
        }
    };

    Ok(AppState::new(engine, ocr, images))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::session_routes())
        .merge(api::scan_routes())
        .merge(api::ocr_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
