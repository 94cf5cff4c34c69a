//! Finalization: ACTIVE → COMPLETED with confirmed webhook delivery
//!
//! The lock is held across the webhook call because COMPLETED, `webhookSent`
//! and the cached summary must be written together with the delivery they
//! describe. The webhook timeout is configured below the lock TTL.
//!
//! If the record write fails after a confirmed delivery the session stays
//! ACTIVE and the next attempt delivers again; receivers must tolerate a
//! repeated `session.completed` for the same token.

use serde::Serialize;

use wbs_common::models::{SessionStatus, SessionSummary};
use wbs_common::{time, Error, Result};

use super::SessionEngine;
use crate::services::WebhookPayload;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub summary: SessionSummary,
    pub webhook_sent: bool,
    /// The session had already been finalized; nothing was sent this time
    pub already_completed: bool,
}

impl FinalizeOutcome {
    fn cached(summary: SessionSummary) -> Self {
        Self {
            summary,
            webhook_sent: true,
            already_completed: true,
        }
    }
}

impl SessionEngine {
    /// Complete the session and notify the downstream system exactly once
    pub async fn finalize(&self, token: &str) -> Result<FinalizeOutcome> {
        let current = self.load(token).await?;
        if current.is_delivered() {
            tracing::debug!(token, "Finalize on completed session, returning cached summary");
            let summary = cached_summary(&current);
            return Ok(FinalizeOutcome::cached(summary));
        }

        self.lock
            .with_lock(token, || async move {
                let mut session = self.load(token).await?;
                if session.is_delivered() {
                    return Ok(FinalizeOutcome::cached(cached_summary(&session)));
                }
                session.ensure_active()?;

                let pending = session.pending_count();
                if pending > 0 {
                    return Err(Error::InvalidState(format!(
                        "{} entries still awaiting OCR",
                        pending
                    )));
                }
                let issues = session.issues();
                if !issues.is_empty() {
                    return Err(Error::InvalidState(format!(
                        "{} entries need manual resolution",
                        issues.len()
                    )));
                }

                let now = time::now();
                let summary = session.build_summary(now);

                self.webhook
                    .deliver(&WebhookPayload::completed(&summary))
                    .await
                    .map_err(|e| {
                        tracing::warn!(token, error = %e, "Completion webhook failed, session left ACTIVE");
                        Error::Delivery(e.to_string())
                    })?;

                session.status = SessionStatus::Completed;
                session.webhook_sent = true;
                session.completed_at = Some(now);
                session.summary = Some(summary.clone());
                session.touch(now);
                self.save(&session).await?;

                tracing::info!(
                    token,
                    total_scans = summary.total_scans,
                    total_weight = summary.total_weight,
                    "Session finalized"
                );
                Ok(FinalizeOutcome {
                    summary,
                    webhook_sent: true,
                    already_completed: false,
                })
            })
            .await
    }
}

fn cached_summary(session: &wbs_common::models::ScanSession) -> SessionSummary {
    match &session.summary {
        Some(summary) => summary.clone(),
        None => session.build_summary(session.completed_at.unwrap_or_else(time::now)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;
    use wbs_common::models::{OcrData, OperationType, COMPLETED_TTL};

    async fn ready_session(h: &Harness) -> String {
        let token = create(h, OperationType::Scan, vec![tomatoes(2)]).await;
        h.engine.append_scan(&token, barcode("A")).await.unwrap();
        h.engine
            .merge_ocr_result(
                &token,
                "A",
                OcrData {
                    product_name: Some("עגבניות".into()),
                    weight_kg: Some(4.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        token
    }

    #[tokio::test]
    async fn test_finalize_delivers_exactly_once() {
        let h = harness();
        let token = ready_session(&h).await;

        let first = h.engine.finalize(&token).await.unwrap();
        assert!(!first.already_completed);
        assert_eq!(first.summary.total_scans, 1);
        assert_eq!(first.summary.total_weight, 4.0);

        let second = h.engine.finalize(&token).await.unwrap();
        assert!(second.already_completed);
        assert_eq!(second.summary, first.summary);
        assert_eq!(h.webhook.deliveries.load(Ordering::SeqCst), 1);

        let session = h.engine.get_session(&token).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.webhook_sent);
        assert_eq!(session.record_ttl(), COMPLETED_TTL);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_delivers_once() {
        let h = harness();
        let token = ready_session(&h).await;

        let (a, b) = tokio::join!(h.engine.finalize(&token), h.engine.finalize(&token));
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| !o.already_completed).count(), 1);
        assert_eq!(h.webhook.deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_session_active() {
        let h = harness();
        let token = ready_session(&h).await;
        h.webhook.failing.store(true, Ordering::SeqCst);

        let result = h.engine.finalize(&token).await;
        assert!(matches!(result, Err(Error::Delivery(_))));

        let session = h.engine.get_session(&token).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!session.webhook_sent);
        assert!(session.summary.is_none());

        h.webhook.failing.store(false, Ordering::SeqCst);
        let retried = h.engine.finalize(&token).await.unwrap();
        assert!(!retried.already_completed);
        assert_eq!(h.webhook.deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finalize_blocked_by_pending_and_issues() {
        let h = harness();
        let token = create(&h, OperationType::Scan, vec![tomatoes(2)]).await;
        h.engine.append_scan(&token, barcode("A")).await.unwrap();

        assert!(matches!(
            h.engine.finalize(&token).await,
            Err(Error::InvalidState(_))
        ));

        h.engine
            .merge_ocr_result(
                &token,
                "A",
                OcrData {
                    product_name: Some("עגבניות".into()),
                    weight_kg: None,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            h.engine.finalize(&token).await,
            Err(Error::InvalidState(_))
        ));
        assert_eq!(h.webhook.deliveries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_session_cannot_finalize() {
        let h = harness();
        let token = ready_session(&h).await;
        h.engine.cancel_session(&token).await.unwrap();
        assert!(matches!(
            h.engine.finalize(&token).await,
            Err(Error::InvalidState(_))
        ));
    }
}
