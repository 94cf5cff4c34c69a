//! OCR callback and watchdog API handlers
//!
//! POST /sessions/:token/ocr, POST /sessions/:token/ocr/failed,
//! POST /sessions/:token/sweep, POST /sessions/:token/status

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use wbs_common::models::OcrData;

use crate::engine::{FailOutcome, MergeOutcome, StatusUpdate};
use crate::{error::ApiResult, AppState};

/// POST /sessions/:token/ocr request; extracted fields sit beside `barcode`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResultRequest {
    pub barcode: String,
    #[serde(flatten)]
    pub data: OcrData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResultResponse {
    pub barcode: String,
    pub outcome: MergeOutcome,
}

/// POST /sessions/:token/ocr/failed request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrFailedRequest {
    pub barcode: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrFailedResponse {
    pub barcode: String,
    pub outcome: FailOutcome,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub swept: Vec<String>,
}

/// POST /sessions/:token/status request
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub updates: Vec<StatusUpdate>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub applied: Vec<String>,
}

/// POST /sessions/:token/ocr
pub async fn submit_ocr_result(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<OcrResultRequest>,
) -> ApiResult<Json<OcrResultResponse>> {
    let outcome = state
        .engine
        .merge_ocr_result(&token, &request.barcode, request.data)
        .await?;
    Ok(Json(OcrResultResponse {
        barcode: request.barcode,
        outcome,
    }))
}

/// POST /sessions/:token/ocr/failed
pub async fn submit_ocr_failure(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<OcrFailedRequest>,
) -> ApiResult<Json<OcrFailedResponse>> {
    let outcome = state
        .engine
        .mark_ocr_failed(&token, &request.barcode, &request.error)
        .await?;
    Ok(Json(OcrFailedResponse {
        barcode: request.barcode,
        outcome,
    }))
}

/// POST /sessions/:token/sweep
///
/// Called by the scanning client's watchdog every few seconds.
pub async fn sweep_timeouts(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<SweepResponse>> {
    let swept = state.engine.sweep_timeouts(&token).await?;
    Ok(Json(SweepResponse { swept }))
}

/// POST /sessions/:token/status
pub async fn update_statuses(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    let applied = state
        .engine
        .atomic_status_update(&token, request.updates)
        .await?;
    Ok(Json(StatusUpdateResponse { applied }))
}

/// Build OCR routes
pub fn ocr_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:token/ocr", post(submit_ocr_result))
        .route("/sessions/:token/ocr/failed", post(submit_ocr_failure))
        .route("/sessions/:token/sweep", post(sweep_timeouts))
        .route("/sessions/:token/status", post(update_statuses))
}
