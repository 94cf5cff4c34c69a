//! Progress and open issues of a session
//!
//! Pure reads over a session value. Callers holding a record read outside the
//! lock get a possibly slightly stale view, which is fine for display.

use serde::Serialize;

use super::aggregate::{contribution_of, ItemKey};
use super::{OcrStatus, ScanSession};
use crate::inference::infer_weight;

/// Scanned vs. expected totals
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub total_boxes_expected: u64,
    pub total_weight_expected: f64,
    pub boxes_scanned: u64,
    pub weight_scanned: f64,
    /// `weight_scanned / total_weight_expected`, 0 when nothing is expected
    pub completion_rate: f64,
    pub entries_total: usize,
    pub entries_pending: usize,
    pub entries_complete: usize,
    pub entries_failed: usize,
    pub entries_manual: usize,
}

/// Why an entry blocks finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingName,
    MissingWeight,
    MissingBoth,
    OcrFailed,
}

/// An entry that needs manual resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIssue {
    pub barcode: String,
    pub kind: IssueKind,
    /// Invoice item the entry's name matched, if any
    pub item_index: Option<u32>,
    /// Inferred weight for a matched entry without one
    pub suggested_weight: Option<f64>,
    pub error: Option<String>,
}

impl ScanSession {
    /// Totals folded over `scannedItems`
    pub fn progress(&self) -> SessionProgress {
        let total_boxes_expected =
            saturating_total(self.invoice_items.iter().map(|i| i.expected_boxes));
        let total_weight_expected: f64 = self.invoice_items.iter().map(|i| i.quantity_kg).sum();
        let boxes_scanned = saturating_total(self.scanned_items.values().map(|a| a.scanned_count));
        let weight_scanned: f64 = self.scanned_items.values().map(|a| a.scanned_weight).sum();

        let completion_rate = if total_weight_expected > 0.0 {
            weight_scanned / total_weight_expected
        } else {
            0.0
        };

        let count = |status: OcrStatus| {
            self.scanned_barcodes
                .iter()
                .filter(|e| e.ocr_status == status)
                .count()
        };

        SessionProgress {
            total_boxes_expected,
            total_weight_expected,
            boxes_scanned,
            weight_scanned,
            completion_rate,
            entries_total: self.scanned_barcodes.len(),
            entries_pending: count(OcrStatus::Pending),
            entries_complete: count(OcrStatus::Complete),
            entries_failed: count(OcrStatus::Failed),
            entries_manual: count(OcrStatus::Manual),
        }
    }

    /// Entries that must be resolved before the session can finalize
    ///
    /// Complete entries lacking a product name and/or weight, and failed
    /// entries. Pending entries are not issues yet.
    pub fn issues(&self) -> Vec<ScanIssue> {
        let mut issues = Vec::new();

        for entry in &self.scanned_barcodes {
            match entry.ocr_status {
                OcrStatus::Failed => issues.push(ScanIssue {
                    barcode: entry.barcode.clone(),
                    kind: IssueKind::OcrFailed,
                    item_index: None,
                    suggested_weight: None,
                    error: entry.ocr_error.clone(),
                }),
                OcrStatus::Complete => {
                    let kind = match (entry.effective_name(), entry.effective_weight()) {
                        (Some(_), Some(_)) => continue,
                        (None, Some(_)) => IssueKind::MissingName,
                        (Some(_), None) => IssueKind::MissingWeight,
                        (None, None) => IssueKind::MissingBoth,
                    };
                    let item_index = match contribution_of(entry, &self.invoice_items) {
                        Some(c) => match c.key {
                            ItemKey::Matched(index) => Some(index),
                            ItemKey::Unmatched(_) => None,
                        },
                        None => None,
                    };
                    let suggested_weight = match (kind, item_index) {
                        (IssueKind::MissingWeight, Some(index)) => {
                            self.suggest_weight(index, &entry.barcode)
                        }
                        _ => None,
                    };
                    issues.push(ScanIssue {
                        barcode: entry.barcode.clone(),
                        kind,
                        item_index,
                        suggested_weight,
                        error: None,
                    });
                }
                // A resolution that names no item contributes to no line
                OcrStatus::Manual if contribution_of(entry, &self.invoice_items).is_none() => {
                    let kind = match entry.effective_weight() {
                        Some(_) => IssueKind::MissingName,
                        None => IssueKind::MissingBoth,
                    };
                    issues.push(ScanIssue {
                        barcode: entry.barcode.clone(),
                        kind,
                        item_index: None,
                        suggested_weight: None,
                        error: None,
                    });
                }
                OcrStatus::Pending | OcrStatus::Manual => {}
            }
        }

        issues
    }

    /// Weight suggestion for `barcode` as one more box of item `item_index`
    pub fn suggest_weight(&self, item_index: u32, barcode: &str) -> Option<f64> {
        let item = self.invoice_item(item_index)?;
        let other_weights: Vec<f64> = self
            .scanned_barcodes
            .iter()
            .filter(|e| e.barcode != barcode)
            .filter(|e| {
                contribution_of(e, &self.invoice_items)
                    .is_some_and(|c| c.key == ItemKey::Matched(item_index))
            })
            .filter_map(|e| e.effective_weight())
            .collect();

        infer_weight(item.quantity_kg, item.expected_boxes, &other_weights)
    }

    /// Number of entries OCR has not answered for yet
    pub fn pending_count(&self) -> usize {
        self.scanned_barcodes
            .iter()
            .filter(|e| e.ocr_status == OcrStatus::Pending)
            .count()
    }
}

/// Sum box counts without overflowing on oversized invoices
fn saturating_total(counts: impl Iterator<Item = u32>) -> u64 {
    counts.fold(0u64, |total, n| total.saturating_add(u64::from(n)))
}
