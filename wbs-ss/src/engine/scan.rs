//! Scan entry mutations: append, manual entries, manual resolution

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wbs_common::models::{
    usable_weight, ManualEntry, OcrStatus, ScanEntry, ScanMethod, SessionProgress, Transition,
};
use wbs_common::{Error, Result};

use super::{Mutation, SessionEngine};

/// A scan submitted by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScan {
    pub barcode: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_public_id: Option<String>,
    #[serde(default = "default_scan_method")]
    pub scan_method: ScanMethod,
}

fn default_scan_method() -> ScanMethod {
    ScanMethod::Barcode
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendStatus {
    Accepted,
    /// Barcode already in the session; nothing changed
    Duplicate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    pub status: AppendStatus,
    pub barcode: String,
    pub progress: SessionProgress,
}

/// Corrections typed in by the resolver; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resolution {
    pub resolved_item_name: Option<String>,
    pub resolved_weight: Option<f64>,
    pub resolved_expiry: Option<String>,
}

impl Resolution {
    fn validate(&self) -> Result<()> {
        if self.resolved_item_name.is_none()
            && self.resolved_weight.is_none()
            && self.resolved_expiry.is_none()
        {
            return Err(Error::InvalidInput(
                "resolution must set at least one of resolvedItemName, resolvedWeight, resolvedExpiry"
                    .to_string(),
            ));
        }
        if let Some(name) = &self.resolved_item_name {
            if name.trim().is_empty() {
                return Err(Error::InvalidInput("resolvedItemName is blank".to_string()));
            }
        }
        check_weight("resolvedWeight", self.resolved_weight)
    }
}

fn check_weight(field: &str, weight: Option<f64>) -> Result<()> {
    match weight {
        Some(w) if usable_weight(Some(w)).is_none() => Err(Error::InvalidInput(format!(
            "{} must be a positive number, got {}",
            field, w
        ))),
        _ => Ok(()),
    }
}

impl SessionEngine {
    /// Append a pending entry for `scan.barcode`
    ///
    /// A barcode already present yields [`AppendStatus::Duplicate`] and leaves
    /// the record untouched.
    pub async fn append_scan(&self, token: &str, scan: NewScan) -> Result<AppendOutcome> {
        let barcode = scan.barcode.trim().to_string();
        if barcode.is_empty() {
            return Err(Error::InvalidInput("barcode is required".to_string()));
        }

        let entry_barcode = barcode.clone();
        let committed = self
            .mutate(token, move |session, now| {
                session.ensure_active()?;
                if session.contains_barcode(&entry_barcode) {
                    return Ok(Mutation::Skip(AppendStatus::Duplicate));
                }
                session.scanned_barcodes.push(ScanEntry::pending(
                    entry_barcode,
                    scan.image_url,
                    scan.image_public_id,
                    scan.scan_method,
                    now,
                ));
                Ok(Mutation::Save(AppendStatus::Accepted))
            })
            .await?;

        match committed.value {
            AppendStatus::Accepted => {
                tracing::info!(token, barcode = %barcode, "Scan appended")
            }
            AppendStatus::Duplicate => {
                tracing::info!(token, barcode = %barcode, "Duplicate scan ignored")
            }
        }

        Ok(AppendOutcome {
            status: committed.value,
            barcode,
            progress: committed.session.progress(),
        })
    }

    /// Add an entry for a box that was never scanned
    ///
    /// The entry gets a synthesized `manual-` barcode and is resolved from the
    /// start.
    pub async fn add_manual_entry(&self, token: &str, manual: ManualEntry) -> Result<ScanEntry> {
        let has_name = manual
            .item_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name && manual.item_index.is_none() {
            return Err(Error::InvalidInput(
                "manual entry needs itemName or itemIndex".to_string(),
            ));
        }
        check_weight("weight", manual.weight)?;

        let barcode = format!("manual-{}", Uuid::new_v4().simple());
        let committed = self
            .mutate(token, move |session, now| {
                session.ensure_active()?;
                if let Some(index) = manual.item_index {
                    if session.invoice_item(index).is_none() {
                        return Err(Error::InvalidInput(format!(
                            "invoice has no item {}",
                            index
                        )));
                    }
                }
                let entry = ScanEntry::manual(barcode, manual, now);
                session.scanned_barcodes.push(entry.clone());
                Ok(Mutation::Save(entry))
            })
            .await?;

        tracing::info!(token, barcode = %committed.value.barcode, "Manual entry added");
        Ok(committed.value)
    }

    /// Apply resolver corrections to `barcode` and mark it manual
    ///
    /// Works from any OCR state; a failed entry is how the resolver clears an
    /// `ocr_failed` issue.
    pub async fn resolve_manually(
        &self,
        token: &str,
        barcode: &str,
        resolution: Resolution,
    ) -> Result<ScanEntry> {
        resolution.validate()?;
        let barcode = barcode.trim();

        let committed = self
            .mutate(token, |session, now| {
                session.ensure_active()?;
                let entry = session
                    .entry_mut(barcode)
                    .ok_or_else(|| Error::NotFound(format!("barcode {}", barcode)))?;

                if entry.ocr_status.transition_to(OcrStatus::Manual) != Transition::Apply {
                    return Err(Error::InvalidState(format!(
                        "entry {} cannot be resolved from {:?}",
                        barcode, entry.ocr_status
                    )));
                }

                if let Some(name) = resolution.resolved_item_name {
                    entry.resolved_item_name = Some(name.trim().to_string());
                }
                if let Some(weight) = resolution.resolved_weight {
                    entry.resolved_weight = Some(weight);
                }
                if let Some(expiry) = resolution.resolved_expiry {
                    entry.resolved_expiry = Some(expiry);
                }
                entry.ocr_status = OcrStatus::Manual;
                entry.ocr_updated_at = Some(now);
                Ok(Mutation::Save(entry.clone()))
            })
            .await?;

        tracing::info!(token, barcode, "Entry resolved manually");
        Ok(committed.value)
    }
}
