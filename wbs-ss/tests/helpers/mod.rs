//! Shared fixtures for wbs-ss integration tests
//!
//! In-memory collaborators plus helpers for driving the router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

use wbs_common::models::OcrData;
use wbs_common::{LockSettings, MemoryStore, RecordStore};
use wbs_ss::engine::{EngineSettings, SessionEngine};
use wbs_ss::services::{
    DeliveryError, ImageHost, ImageHostError, InventoryLedger, IssueRequest, LedgerError,
    OcrDispatcher, OcrError, OcrService, UploadedImage, WebhookPayload, WebhookSender,
};
use wbs_ss::{build_router, AppState};

/// Webhook recording every payload it confirms
#[derive(Default)]
pub struct FakeWebhook {
    pub delivered: Mutex<Vec<Value>>,
    pub failing: AtomicBool,
}

impl FakeWebhook {
    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookSender for FakeWebhook {
    async fn deliver(&self, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(503, "unavailable".into()));
        }
        let value = serde_json::to_value(payload).unwrap();
        self.delivered.lock().unwrap().push(value);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub calls: AtomicUsize,
}

#[async_trait]
impl InventoryLedger for FakeLedger {
    async fn record_issue(&self, request: &IssueRequest<'_>) -> Result<String, LedgerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ledger-{}-{}", request.item_code, n))
    }
}

#[derive(Default)]
pub struct FakeImageHost {
    pub uploads: AtomicUsize,
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<UploadedImage, ImageHostError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadedImage {
            url: format!("https://img.example/{}/{}-{}.jpg", folder, n, bytes.len()),
            public_id: format!("{}/{}", folder, n),
        })
    }
}

/// OCR answering from a table keyed by image URL substring
#[derive(Default)]
pub struct ScriptedOcr {
    pub answers: Mutex<Vec<(String, Option<OcrData>)>>,
}

impl ScriptedOcr {
    pub fn answer(&self, url_fragment: &str, data: Option<OcrData>) {
        self.answers
            .lock()
            .unwrap()
            .push((url_fragment.to_string(), data));
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    async fn extract(&self, image_url: &str, _correlation_id: &str) -> Result<OcrData, OcrError> {
        let answers = self.answers.lock().unwrap();
        match answers.iter().find(|(fragment, _)| image_url.contains(fragment.as_str())) {
            Some((_, Some(data))) => Ok(data.clone()),
            Some((_, None)) => Err(OcrError::ExtractionFailed("unreadable".into())),
            None => Err(OcrError::ApiError(404, format!("no answer for {}", image_url))),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: SessionEngine,
    pub store: Arc<MemoryStore>,
    pub webhook: Arc<FakeWebhook>,
    pub ledger: Arc<FakeLedger>,
    pub images: Arc<FakeImageHost>,
    pub ocr: Arc<ScriptedOcr>,
}

pub fn fast_lock() -> LockSettings {
    LockSettings {
        max_retries: 200,
        retry_delay_ms: 5,
        ttl_seconds: 10,
    }
}

/// App without OCR dispatch; OCR results are posted by the test
pub fn setup_app() -> TestApp {
    build_app(false)
}

/// App dispatching accepted scans to [`ScriptedOcr`]
pub fn setup_app_with_ocr() -> TestApp {
    build_app(true)
}

fn build_app(with_ocr: bool) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let webhook = Arc::new(FakeWebhook::default());
    let ledger = Arc::new(FakeLedger::default());
    let images = Arc::new(FakeImageHost::default());
    let ocr = Arc::new(ScriptedOcr::default());

    let settings = EngineSettings {
        lock: fast_lock(),
        pending_deadline: Duration::from_secs(40),
        public_base_url: "https://scan.example".to_string(),
    };
    let store_dyn: Arc<dyn RecordStore> = store.clone();
    let engine = SessionEngine::new(store_dyn, webhook.clone(), ledger.clone(), settings);
    let dispatcher = with_ocr.then(|| {
        OcrDispatcher::new(engine.clone(), ocr.clone(), Duration::from_secs(5))
    });

    let state = AppState::new(engine.clone(), dispatcher, images.clone());
    TestApp {
        router: build_router(state),
        engine,
        store,
        webhook,
        ledger,
        images,
        ocr,
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request, returning status and parsed JSON body
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Invoice with one tomatoes line `{quantityKg: 10, expectedBoxes}`
pub fn tomato_invoice(expected_boxes: u32) -> Value {
    json!([{
        "itemIndex": 0,
        "itemCode": "T-100",
        "nameEnglish": "Tomatoes",
        "nameHebrew": "עגבניות",
        "quantityKg": 10.0,
        "expectedBoxes": expected_boxes
    }])
}

pub async fn create_session(app: &TestApp, operation_type: &str, invoice: Value) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/sessions",
            json!({
                "chatId": 5550001,
                "operationType": operation_type,
                "documentNumber": "INV-2024-118",
                "invoiceItems": invoice
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

pub async fn post_scan(app: &TestApp, token: &str, barcode: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            &format!("/sessions/{}/scans", token),
            json!({
                "barcode": barcode,
                "imageUrl": format!("https://img.example/{}.jpg", barcode),
                "imagePublicId": barcode,
                "scanMethod": "barcode"
            }),
        ),
    )
    .await
}

pub async fn post_ocr(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        json_request("POST", &format!("/sessions/{}/ocr", token), body),
    )
    .await
}

/// Poll `GET /sessions/:token` until `done` holds or two seconds pass
pub async fn wait_for<F>(app: &TestApp, token: &str, done: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..200 {
        let (_, body) = send(app, test_request("GET", &format!("/sessions/{}", token))).await;
        if done(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached for session {}", token);
}
