//! Scan entries and their OCR state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a box entered the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    /// Barcode or QR symbol decoded by the camera
    Barcode,
    /// Label photographed without a readable symbol; id synthesized by the client
    ManualCapture,
    /// Worker confirmed the box by hand
    ForceConfirm,
}

/// OCR/resolution state of one scan entry
///
/// ```text
/// pending ──► complete ──► manual
///    │           ▲            ▲
///    └──► failed ┴────────────┘
/// ```
///
/// | from \ to | complete | failed | manual |
/// |-----------|----------|--------|--------|
/// | pending   | apply    | apply  | apply  |
/// | failed    | apply    | no-op  | apply  |
/// | complete  | no-op    | no-op  | apply  |
/// | manual    | no-op    | no-op  | apply  |
///
/// Nothing moves back to `pending`. A late OCR result may still complete a
/// timed-out entry, but never overrides a manual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrStatus {
    Pending,
    Complete,
    Failed,
    Manual,
}

/// Outcome of checking a requested [`OcrStatus`] change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Perform the change
    Apply,
    /// Leave the entry as is; the request is stale or a duplicate
    Ignore,
    /// The change is never valid
    Reject,
}

impl OcrStatus {
    /// Look up `self → next` in the transition table
    pub fn transition_to(self, next: OcrStatus) -> Transition {
        use OcrStatus::*;
        match (self, next) {
            (Pending, Pending) => Transition::Ignore,
            (_, Pending) => Transition::Reject,
            (_, Manual) => Transition::Apply,
            (Pending, _) => Transition::Apply,
            (Failed, Complete) => Transition::Apply,
            (Failed, Failed) | (Complete, _) | (Manual, _) => Transition::Ignore,
        }
    }
}

/// Fields extracted from a label photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrData {
    pub product_name: Option<String>,
    pub weight_kg: Option<f64>,
    pub production_date: Option<String>,
    pub expiry_date: Option<String>,
    pub barcode_digits: Option<String>,
}

impl OcrData {
    /// Product name, if the label yielded a non-blank one
    pub fn name(&self) -> Option<&str> {
        non_blank(self.product_name.as_deref())
    }

    /// Weight, if the label yielded a usable one
    pub fn weight(&self) -> Option<f64> {
        usable_weight(self.weight_kg)
    }
}

/// Details typed in for a box that was never scanned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualEntry {
    pub item_name: Option<String>,
    pub item_index: Option<u32>,
    pub weight: Option<f64>,
    pub expiry: Option<String>,
    pub notes: Option<String>,
}

/// One box within a session, keyed by `barcode`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEntry {
    pub barcode: String,
    pub scanned_at: DateTime<Utc>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_public_id: Option<String>,
    pub scan_method: ScanMethod,
    pub ocr_status: OcrStatus,
    #[serde(default)]
    pub ocr_data: Option<OcrData>,
    #[serde(default)]
    pub ocr_error: Option<String>,
    #[serde(default)]
    pub ocr_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_item_name: Option<String>,
    #[serde(default)]
    pub resolved_weight: Option<f64>,
    #[serde(default)]
    pub resolved_expiry: Option<String>,
    #[serde(default)]
    pub manual_entry: Option<ManualEntry>,
}

impl ScanEntry {
    /// New entry awaiting OCR
    pub fn pending(
        barcode: String,
        image_url: Option<String>,
        image_public_id: Option<String>,
        scan_method: ScanMethod,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            barcode,
            scanned_at,
            image_url,
            image_public_id,
            scan_method,
            ocr_status: OcrStatus::Pending,
            ocr_data: None,
            ocr_error: None,
            ocr_updated_at: None,
            resolved_item_name: None,
            resolved_weight: None,
            resolved_expiry: None,
            manual_entry: None,
        }
    }

    /// New entry created from typed-in details, already resolved
    pub fn manual(barcode: String, manual_entry: ManualEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            ocr_status: OcrStatus::Manual,
            ocr_updated_at: Some(created_at),
            manual_entry: Some(manual_entry),
            ..Self::pending(barcode, None, None, ScanMethod::ForceConfirm, created_at)
        }
    }

    /// Product name this entry is attributed to, if any
    ///
    /// Manual corrections take precedence over typed-in details, which take
    /// precedence over what OCR read. Pending and failed entries have none.
    pub fn effective_name(&self) -> Option<&str> {
        let ocr_name = self.ocr_data.as_ref().and_then(OcrData::name);
        match self.ocr_status {
            OcrStatus::Complete => ocr_name,
            OcrStatus::Manual => non_blank(self.resolved_item_name.as_deref())
                .or_else(|| {
                    self.manual_entry
                        .as_ref()
                        .and_then(|m| non_blank(m.item_name.as_deref()))
                })
                .or(ocr_name),
            OcrStatus::Pending | OcrStatus::Failed => None,
        }
    }

    /// Weight this entry contributes, if known
    pub fn effective_weight(&self) -> Option<f64> {
        let ocr_weight = self.ocr_data.as_ref().and_then(OcrData::weight);
        match self.ocr_status {
            OcrStatus::Complete => ocr_weight,
            OcrStatus::Manual => usable_weight(self.resolved_weight)
                .or_else(|| self.manual_entry.as_ref().and_then(|m| usable_weight(m.weight)))
                .or(ocr_weight),
            OcrStatus::Pending | OcrStatus::Failed => None,
        }
    }

    /// Invoice item chosen directly by index on a typed-in entry
    ///
    /// Only used when no name correction overrides it.
    pub fn explicit_item_index(&self) -> Option<u32> {
        if self.ocr_status != OcrStatus::Manual
            || non_blank(self.resolved_item_name.as_deref()).is_some()
        {
            return None;
        }
        self.manual_entry.as_ref().and_then(|m| m.item_index)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A weight is usable when finite and strictly positive
pub fn usable_weight(weight: Option<f64>) -> Option<f64> {
    weight.filter(|w| w.is_finite() && *w > 0.0)
}
