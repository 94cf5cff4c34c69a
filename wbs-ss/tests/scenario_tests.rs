//! End-to-end scanning scenarios
//!
//! Each test walks a session from creation through scans, OCR outcomes and
//! corrections the way the scanning client and the bot drive it.

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use helpers::*;
use wbs_common::models::OcrData;

#[tokio::test]
async fn test_scan_merge_and_duplicate() {
    let app = setup_app();
    let token = create_session(&app, "SCAN", tomato_invoice(2)).await;

    let (_, first) = post_scan(&app, &token, "A").await;
    assert_eq!(first["status"], "accepted");

    post_ocr(&app, &token, json!({"barcode": "A", "productName": "עגבניות", "weightKg": 4.0})).await;

    let (_, session) = send(&app, test_request("GET", &format!("/sessions/{}", token))).await;
    assert_eq!(session["scannedItems"]["0"]["scannedCount"], 1);
    assert_eq!(session["scannedItems"]["0"]["scannedWeight"], 4.0);

    let (status, again) = post_scan(&app, &token, "A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "duplicate");

    let (_, unchanged) = send(&app, test_request("GET", &format!("/sessions/{}", token))).await;
    assert_eq!(unchanged["scannedItems"], session["scannedItems"]);
    assert_eq!(unchanged["scannedBarcodes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_timeout_sweep_then_manual_resolution() {
    let app = setup_app();
    let token = create_session(&app, "SCAN", tomato_invoice(2)).await;
    post_scan(&app, &token, "B").await;

    // Nothing answers for 41 seconds
    let swept = app
        .engine
        .sweep_timeouts_at(&token, Utc::now() + ChronoDuration::seconds(41))
        .await
        .unwrap();
    assert_eq!(swept, vec!["B".to_string()]);

    let (_, report) = send(&app, test_request("GET", &format!("/sessions/{}/progress", token))).await;
    assert_eq!(report["issues"][0]["kind"], "ocr_failed");
    assert_eq!(report["issues"][0]["error"], "ocr_timeout");

    let (status, entry) = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/resolve", token),
            json!({"barcode": "B", "resolvedItemName": "עגבניות", "resolvedWeight": 6.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["ocrStatus"], "manual");

    let (_, session) = send(&app, test_request("GET", &format!("/sessions/{}", token))).await;
    assert_eq!(session["scannedItems"]["0"]["scannedCount"], 1);
    assert_eq!(session["scannedItems"]["0"]["scannedWeight"], 6.0);

    // A straggling OCR answer does not override the worker
    let (_, late) = post_ocr(&app, &token, json!({"barcode": "B", "productName": "Cucumbers", "weightKg": 1.0})).await;
    assert_eq!(late["outcome"], "ignored");
}

#[tokio::test]
async fn test_dispatched_ocr_completes_and_fails() {
    let app = setup_app_with_ocr();
    app.ocr.answer(
        "/A.jpg",
        Some(OcrData {
            product_name: Some("Tomatoes".into()),
            weight_kg: Some(5.5),
            expiry_date: Some("2026-11-30".into()),
            ..Default::default()
        }),
    );
    app.ocr.answer("/B.jpg", None);

    let token = create_session(&app, "SCAN", tomato_invoice(2)).await;

    let (_, scan_a) = post_scan(&app, &token, "A").await;
    assert_eq!(scan_a["ocrDispatched"], true);
    let (_, scan_b) = post_scan(&app, &token, "B").await;
    assert_eq!(scan_b["ocrDispatched"], true);

    let session = wait_for(&app, &token, |s| settled(s, 2)).await;
    let entries = session["scannedBarcodes"].as_array().unwrap();
    assert_eq!(entries[0]["ocrStatus"], "complete");
    assert_eq!(entries[0]["ocrData"]["weightKg"], 5.5);
    assert_eq!(entries[1]["ocrStatus"], "failed");
    assert!(entries[1]["ocrError"].as_str().unwrap().starts_with("ocr_error"));
    assert_eq!(session["scannedItems"]["0"]["scannedWeight"], 5.5);

    let (status, _) = send(&app, test_request("POST", &format!("/sessions/{}/finalize", token))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/resolve", token),
            json!({"barcode": "B", "resolvedItemName": "Tomatoes", "resolvedWeight": 4.5}),
        ),
    )
    .await;

    let (status, done) = send(&app, test_request("POST", &format!("/sessions/{}/finalize", token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["summary"]["totalWeight"], 10.0);
    assert_eq!(done["summary"]["totalScans"], 2);
    assert_eq!(app.webhook.delivery_count(), 1);
}

#[tokio::test]
async fn test_unmatched_product_gets_own_bucket() {
    let app = setup_app();
    let token = create_session(&app, "SCAN", tomato_invoice(2)).await;
    post_scan(&app, &token, "X").await;
    post_ocr(&app, &token, json!({"barcode": "X", "productName": "Olive Oil", "weightKg": 2.0})).await;

    let (_, session) = send(&app, test_request("GET", &format!("/sessions/{}", token))).await;
    let items = session["scannedItems"].as_object().unwrap();
    assert_eq!(items.len(), 1);
    let (key, bucket) = items.iter().next().unwrap();
    assert!(key.starts_with("unmatched:"));
    assert_eq!(bucket["itemName"], "Olive Oil");
    assert_eq!(bucket["expectedBoxes"], 0);
}

#[tokio::test]
async fn test_completed_session_rejects_further_scans() {
    let app = setup_app();
    let token = create_session(&app, "SCAN", tomato_invoice(1)).await;
    post_scan(&app, &token, "A").await;
    post_ocr(&app, &token, json!({"barcode": "A", "productName": "Tomatoes", "weightKg": 10.0})).await;

    let (status, _) = send(&app, test_request("POST", &format!("/sessions/{}/finalize", token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_scan(&app, &token, "B").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, test_request("DELETE", &format!("/sessions/{}", token))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, session) = send(&app, test_request("GET", &format!("/sessions/{}", token))).await;
    assert_eq!(session["status"], "COMPLETED");
    assert_eq!(session["webhookSent"], true);
    assert!(session["completedAt"].is_string());
}

fn settled(session: &serde_json::Value, expected: usize) -> bool {
    session["scannedBarcodes"]
        .as_array()
        .map(|entries| {
            entries.len() == expected && entries.iter().all(|e| e["ocrStatus"] != "pending")
        })
        .unwrap_or(false)
}
