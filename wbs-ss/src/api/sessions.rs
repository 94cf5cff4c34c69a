//! Session lifecycle API handlers
//!
//! POST /sessions, GET /sessions/:token, GET /sessions/:token/progress,
//! POST /sessions/:token/finalize, DELETE /sessions/:token

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use wbs_common::models::{ScanSession, SessionStatus};

use crate::engine::{CreateSession, CreatedSession, FinalizeOutcome, ProgressReport};
use crate::{error::ApiResult, AppState};

/// DELETE /sessions/:token response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionResponse {
    pub token: String,
    pub status: SessionStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// POST /sessions
///
/// Create a session for one invoice. Returns 201 with the token and the URL
/// the scanning client should open.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSession>,
) -> ApiResult<(StatusCode, Json<CreatedSession>)> {
    let created = state.engine.create_session(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /sessions/:token
pub async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ScanSession>> {
    Ok(Json(state.engine.get_session(&token).await?))
}

/// GET /sessions/:token/progress
///
/// Totals, blocking issues with weight suggestions, and whether the session
/// can be finalized now.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ProgressReport>> {
    Ok(Json(state.engine.get_progress(&token).await?))
}

/// POST /sessions/:token/finalize
///
/// Idempotent. 502 when the webhook is not confirmed; the session then stays
/// ACTIVE and the call can be repeated.
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<FinalizeOutcome>> {
    Ok(Json(state.engine.finalize(&token).await?))
}

/// DELETE /sessions/:token
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<CancelSessionResponse>> {
    let session = state.engine.cancel_session(&token).await?;
    Ok(Json(CancelSessionResponse {
        token: session.token,
        status: session.status,
        cancelled_at: session.cancelled_at,
    }))
}

/// Build session lifecycle routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:token", get(get_session).delete(cancel_session))
        .route("/sessions/:token/progress", get(get_progress))
        .route("/sessions/:token/finalize", post(finalize_session))
}
