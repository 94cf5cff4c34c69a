//! OCR-driven entry transitions
//!
//! OCR results arrive on their own timeline, possibly long after the scan
//! that triggered them and possibly after the watchdog gave up on the entry.
//! Each operation here is an independent locked mutator; stale or duplicate
//! events are ignored according to the [`OcrStatus`] transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wbs_common::models::{OcrData, OcrStatus, Transition};
use wbs_common::{time, Error, Result};

use super::{Mutation, SessionEngine};

/// Error tag recorded on entries the watchdog gave up on
pub const OCR_TIMEOUT_ERROR: &str = "ocr_timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOutcome {
    Merged,
    /// Entry missing or already past the point a result can change it
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailOutcome {
    Marked,
    Ignored,
}

/// One element of a batched status update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub barcode: String,
    pub ocr_status: OcrStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl SessionEngine {
    /// Record an OCR result for `barcode`
    pub async fn merge_ocr_result(
        &self,
        token: &str,
        barcode: &str,
        data: OcrData,
    ) -> Result<MergeOutcome> {
        let barcode = barcode.trim();
        let committed = self
            .mutate(token, |session, now| {
                session.ensure_active()?;
                let Some(entry) = session.entry_mut(barcode) else {
                    return Ok(Mutation::Skip(MergeOutcome::Ignored));
                };
                if entry.ocr_status.transition_to(OcrStatus::Complete) != Transition::Apply {
                    return Ok(Mutation::Skip(MergeOutcome::Ignored));
                }
                entry.ocr_data = Some(data);
                entry.ocr_status = OcrStatus::Complete;
                entry.ocr_error = None;
                entry.ocr_updated_at = Some(now);
                Ok(Mutation::Save(MergeOutcome::Merged))
            })
            .await?;

        match committed.value {
            MergeOutcome::Merged => tracing::info!(token, barcode, "OCR result merged"),
            MergeOutcome::Ignored => {
                tracing::debug!(token, barcode, "Stale OCR result ignored")
            }
        }
        Ok(committed.value)
    }

    /// Mark `barcode` failed with `reason`
    ///
    /// Only pending entries change; a result that already arrived is kept.
    pub async fn mark_ocr_failed(
        &self,
        token: &str,
        barcode: &str,
        reason: &str,
    ) -> Result<FailOutcome> {
        let barcode = barcode.trim();
        let committed = self
            .mutate(token, |session, now| {
                session.ensure_active()?;
                let entry = session
                    .entry_mut(barcode)
                    .ok_or_else(|| Error::NotFound(format!("barcode {}", barcode)))?;
                if entry.ocr_status.transition_to(OcrStatus::Failed) != Transition::Apply {
                    return Ok(Mutation::Skip(FailOutcome::Ignored));
                }
                entry.ocr_status = OcrStatus::Failed;
                entry.ocr_error = Some(reason.to_string());
                entry.ocr_updated_at = Some(now);
                Ok(Mutation::Save(FailOutcome::Marked))
            })
            .await?;

        if committed.value == FailOutcome::Marked {
            tracing::warn!(token, barcode, reason, "OCR marked failed");
        }
        Ok(committed.value)
    }

    /// Fail every entry pending longer than the deadline
    pub async fn sweep_timeouts(&self, token: &str) -> Result<Vec<String>> {
        self.sweep_timeouts_at(token, time::now()).await
    }

    /// [`Self::sweep_timeouts`] judged as of `at`
    ///
    /// A session that is no longer ACTIVE has nothing left to sweep.
    pub async fn sweep_timeouts_at(&self, token: &str, at: DateTime<Utc>) -> Result<Vec<String>> {
        let deadline = chrono::Duration::from_std(self.settings.pending_deadline)
            .map_err(|e| Error::Internal(format!("pending deadline out of range: {}", e)))?;

        let committed = self
            .mutate(token, move |session, now| {
                if !session.is_active() {
                    return Ok(Mutation::Skip(Vec::new()));
                }
                let mut swept = Vec::new();
                for entry in session
                    .scanned_barcodes
                    .iter_mut()
                    .filter(|e| e.ocr_status == OcrStatus::Pending)
                {
                    if at - entry.scanned_at > deadline {
                        entry.ocr_status = OcrStatus::Failed;
                        entry.ocr_error = Some(OCR_TIMEOUT_ERROR.to_string());
                        entry.ocr_updated_at = Some(now);
                        swept.push(entry.barcode.clone());
                    }
                }
                if swept.is_empty() {
                    Ok(Mutation::Skip(swept))
                } else {
                    Ok(Mutation::Save(swept))
                }
            })
            .await?;

        if !committed.value.is_empty() {
            tracing::warn!(
                token,
                count = committed.value.len(),
                barcodes = ?committed.value,
                "Pending OCR entries timed out"
            );
        }
        Ok(committed.value)
    }

    /// Apply several `failed` transitions in one critical section
    ///
    /// Entries that are missing or no longer pending are skipped; the
    /// barcodes actually changed are returned.
    pub async fn atomic_status_update(
        &self,
        token: &str,
        updates: Vec<StatusUpdate>,
    ) -> Result<Vec<String>> {
        if let Some(bad) = updates.iter().find(|u| u.ocr_status != OcrStatus::Failed) {
            return Err(Error::InvalidInput(format!(
                "batched update only supports ocrStatus=failed, got {:?} for {}",
                bad.ocr_status, bad.barcode
            )));
        }

        let committed = self
            .mutate(token, move |session, now| {
                session.ensure_active()?;
                let mut applied = Vec::new();
                for update in updates {
                    let barcode = update.barcode.trim().to_string();
                    let Some(entry) = session.entry_mut(&barcode) else {
                        continue;
                    };
                    if entry.ocr_status.transition_to(update.ocr_status) != Transition::Apply {
                        continue;
                    }
                    entry.ocr_status = update.ocr_status;
                    entry.ocr_error = update.error;
                    entry.ocr_updated_at = Some(now);
                    applied.push(barcode);
                }
                if applied.is_empty() {
                    Ok(Mutation::Skip(applied))
                } else {
                    Ok(Mutation::Save(applied))
                }
            })
            .await?;

        tracing::debug!(token, applied = committed.value.len(), "Batched status update");
        Ok(committed.value)
    }
}
