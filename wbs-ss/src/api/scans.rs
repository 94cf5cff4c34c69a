//! Scanning client API handlers
//!
//! POST /sessions/:token/images, POST /sessions/:token/scans,
//! POST /sessions/:token/resolve, POST /sessions/:token/manual-entries,
//! POST /sessions/:token/issued-boxes

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use wbs_common::models::{ManualEntry, ScanEntry};

use crate::engine::{AppendOutcome, AppendStatus, IssueBoxRequest, IssueOutcome, NewScan, Resolution};
use crate::error::{ApiError, ApiResult};
use crate::services::{ImageHostError, UploadedImage};
use crate::AppState;

/// Largest accepted label photo
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// POST /sessions/:token/scans response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendScanResponse {
    #[serde(flatten)]
    pub outcome: AppendOutcome,
    /// OCR was started for this scan
    pub ocr_dispatched: bool,
}

/// POST /sessions/:token/resolve request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub barcode: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// POST /sessions/:token/images
///
/// Raw image bytes in the body; forwarded to the image host.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> ApiResult<Json<UploadedImage>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Image body is empty".to_string()));
    }
    state.engine.get_session(&token).await?.ensure_active()?;

    let folder = format!("wbs/{}", token);
    let uploaded = state
        .images
        .upload(body.to_vec(), &folder)
        .await
        .map_err(|e| match e {
            ImageHostError::NotConfigured => ApiError::Internal(e.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        })?;
    Ok(Json(uploaded))
}

/// POST /sessions/:token/scans
///
/// Duplicates answer 200 with `status: "duplicate"`. An accepted scan with an
/// image starts OCR in the background.
pub async fn append_scan(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(scan): Json<NewScan>,
) -> ApiResult<Json<AppendScanResponse>> {
    let image_url = scan.image_url.clone().filter(|u| !u.trim().is_empty());
    let outcome = state.engine.append_scan(&token, scan).await?;

    let ocr_dispatched = match (&outcome.status, image_url, &state.ocr) {
        (AppendStatus::Accepted, Some(url), Some(dispatcher)) => {
            dispatcher.dispatch(token.clone(), outcome.barcode.clone(), url);
            true
        }
        _ => false,
    };

    Ok(Json(AppendScanResponse {
        outcome,
        ocr_dispatched,
    }))
}

/// POST /sessions/:token/resolve
pub async fn resolve_entry(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ScanEntry>> {
    let entry = state
        .engine
        .resolve_manually(&token, &request.barcode, request.resolution)
        .await?;
    Ok(Json(entry))
}

/// POST /sessions/:token/manual-entries
pub async fn add_manual_entry(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(manual): Json<ManualEntry>,
) -> ApiResult<(StatusCode, Json<ScanEntry>)> {
    let entry = state.engine.add_manual_entry(&token, manual).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /sessions/:token/issued-boxes
pub async fn issue_box(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<IssueBoxRequest>,
) -> ApiResult<Json<IssueOutcome>> {
    Ok(Json(state.engine.issue_box(&token, request).await?))
}

/// Build scanning client routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions/:token/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/sessions/:token/scans", post(append_scan))
        .route("/sessions/:token/resolve", post(resolve_entry))
        .route("/sessions/:token/manual-entries", post(add_manual_entry))
        .route("/sessions/:token/issued-boxes", post(issue_box))
}
