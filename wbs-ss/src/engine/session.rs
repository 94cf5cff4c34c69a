//! Session lifecycle: create, read, progress, cancel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use wbs_common::models::{
    InvoiceItem, OperationType, ScanIssue, ScanSession, SessionProgress, SessionStatus,
};
use wbs_common::{time, Error, Result};

use super::{Mutation, SessionEngine};

/// Input of [`SessionEngine::create_session`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    #[serde(deserialize_with = "string_or_number")]
    pub chat_id: String,
    pub operation_type: OperationType,
    #[serde(default)]
    pub document_number: Option<String>,
    pub invoice_items: Vec<InvoiceItem>,
}

/// Chat ids arrive as JSON numbers from some clients
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub token: String,
    pub scan_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Progress plus everything standing between the session and finalization
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub token: String,
    pub status: SessionStatus,
    pub progress: SessionProgress,
    pub issues: Vec<ScanIssue>,
    pub ready_to_finalize: bool,
}

impl ProgressReport {
    pub fn of(session: &ScanSession) -> Self {
        let progress = session.progress();
        let issues = session.issues();
        let ready_to_finalize =
            session.is_active() && progress.entries_pending == 0 && issues.is_empty();
        Self {
            token: session.token.clone(),
            status: session.status,
            progress,
            issues,
            ready_to_finalize,
        }
    }
}

impl SessionEngine {
    /// Create and persist a new ACTIVE session
    ///
    /// The token is freshly generated, so there is no prior record to lock.
    pub async fn create_session(&self, request: CreateSession) -> Result<CreatedSession> {
        let chat_id = request.chat_id.trim().to_string();
        if chat_id.is_empty() {
            return Err(Error::InvalidInput("chatId is required".to_string()));
        }
        let document_number = request
            .document_number
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let session = ScanSession::new(
            chat_id,
            request.operation_type,
            document_number,
            request.invoice_items,
            time::now(),
        )?;
        self.save(&session).await?;

        tracing::info!(
            token = %session.token,
            chat_id = %session.chat_id,
            operation_type = ?session.operation_type,
            items = session.invoice_items.len(),
            "Session created"
        );

        Ok(CreatedSession {
            scan_url: self.scan_url(&session.token),
            token: session.token,
            expires_at: session.expires_at,
        })
    }

    /// Read the current record without locking
    pub async fn get_session(&self, token: &str) -> Result<ScanSession> {
        self.load(token).await
    }

    /// Progress and blocking issues, from an unlocked read
    pub async fn get_progress(&self, token: &str) -> Result<ProgressReport> {
        let session = self.load(token).await?;
        Ok(ProgressReport::of(&session))
    }

    /// Move an ACTIVE session to CANCELLED
    ///
    /// The record is kept for a short grace period so polling clients see the
    /// cancellation instead of a missing session.
    pub async fn cancel_session(&self, token: &str) -> Result<ScanSession> {
        let committed = self
            .mutate(token, |session, now| {
                session.ensure_active()?;
                session.status = SessionStatus::Cancelled;
                session.cancelled_at = Some(now);
                Ok(Mutation::Save(()))
            })
            .await?;

        tracing::info!(token, "Session cancelled");
        Ok(committed.session)
    }

    fn scan_url(&self, token: &str) -> String {
        format!(
            "{}/scan/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            token
        )
    }
}
