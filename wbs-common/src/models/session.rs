//! Scan session record
//!
//! The root entity: one scanning (or issuing) operation against one invoice.
//! It lives in the record store under `session:<token>` as a JSON blob and is
//! only ever mutated by the session engine while holding the session lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use super::aggregate::{aggregate_entries, ItemAggregate, ItemKey};
use super::ScanEntry;
use crate::{Error, Result};

/// Record TTL while the session is open (sliding, refreshed on every write)
pub const ACTIVE_TTL: Duration = Duration::from_secs(3600);

/// Record TTL once the session is completed
pub const COMPLETED_TTL: Duration = Duration::from_secs(86_400);

/// Grace TTL for a cancelled session so polling clients observe the cancel
pub const CANCELLED_TTL: Duration = Duration::from_secs(300);

/// Workflow a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Receive boxes against an invoice
    Scan,
    /// Issue boxes from stock to production
    Issue,
}

/// Session lifecycle state
///
/// `ACTIVE → COMPLETED` (finalize) and `ACTIVE → CANCELLED` (cancel) are the
/// only transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

/// One invoice line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub item_index: u32,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub name_english: String,
    #[serde(default)]
    pub name_hebrew: String,
    pub quantity_kg: f64,
    pub expected_boxes: u32,
}

impl InvoiceItem {
    /// Name shown in summaries: Hebrew when present, else English
    pub fn display_name(&self) -> &str {
        if self.name_hebrew.trim().is_empty() {
            self.name_english.trim()
        } else {
            self.name_hebrew.trim()
        }
    }
}

/// A box issued to production (ISSUE workflow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedBox {
    pub barcode: String,
    pub item_index: u32,
    pub item_code: String,
    pub weight_kg: f64,
    pub transaction_id: String,
    pub issued_at: DateTime<Utc>,
}

/// One line of the completion summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub key: ItemKey,
    pub item_index: Option<u32>,
    pub item_name: String,
    pub scanned_count: u32,
    pub scanned_weight: f64,
    pub expected_weight: f64,
    pub expected_boxes: u32,
}

/// Completion summary delivered by the webhook and cached on the record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub token: String,
    pub chat_id: String,
    pub operation_type: OperationType,
    pub document_number: Option<String>,
    pub total_items: usize,
    pub total_scans: usize,
    pub total_weight: f64,
    pub items: Vec<SummaryLine>,
    pub issued_boxes: Vec<IssuedBox>,
    pub generated_at: DateTime<Utc>,
}

/// The scan session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    pub token: String,
    pub chat_id: String,
    pub operation_type: OperationType,
    #[serde(default)]
    pub document_number: Option<String>,
    pub invoice_items: Vec<InvoiceItem>,
    #[serde(default)]
    pub scanned_barcodes: Vec<ScanEntry>,
    #[serde(default)]
    pub scanned_items: BTreeMap<ItemKey, ItemAggregate>,
    #[serde(default)]
    pub issued_boxes: Vec<IssuedBox>,
    pub status: SessionStatus,
    #[serde(default)]
    pub webhook_sent: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<SessionSummary>,
}

impl ScanSession {
    /// Create a new active session with a fresh token
    pub fn new(
        chat_id: String,
        operation_type: OperationType,
        document_number: Option<String>,
        invoice_items: Vec<InvoiceItem>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_invoice(&invoice_items)?;
        Ok(Self {
            token: Uuid::new_v4().simple().to_string(),
            chat_id,
            operation_type,
            document_number,
            invoice_items,
            scanned_barcodes: Vec::new(),
            scanned_items: BTreeMap::new(),
            issued_boxes: Vec::new(),
            status: SessionStatus::Active,
            webhook_sent: false,
            created_at: now,
            expires_at: crate::time::expiry_after(now, ACTIVE_TTL),
            completed_at: None,
            cancelled_at: None,
            summary: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Finalized and the notification confirmed delivered
    pub fn is_delivered(&self) -> bool {
        self.status == SessionStatus::Completed && self.webhook_sent
    }

    /// Fail with [`Error::InvalidState`] unless the session is active
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "session {} is {:?}, not ACTIVE",
                self.token, self.status
            )))
        }
    }

    pub fn entry(&self, barcode: &str) -> Option<&ScanEntry> {
        self.scanned_barcodes.iter().find(|e| e.barcode == barcode)
    }

    pub fn entry_mut(&mut self, barcode: &str) -> Option<&mut ScanEntry> {
        self.scanned_barcodes.iter_mut().find(|e| e.barcode == barcode)
    }

    pub fn contains_barcode(&self, barcode: &str) -> bool {
        self.entry(barcode).is_some()
    }

    pub fn invoice_item(&self, item_index: u32) -> Option<&InvoiceItem> {
        self.invoice_items.iter().find(|i| i.item_index == item_index)
    }

    /// Rebuild `scannedItems` from `scannedBarcodes`
    ///
    /// Every mutation of an entry's attribution must be followed by this
    /// call within the same critical section.
    pub fn refresh_aggregates(&mut self) {
        self.scanned_items = aggregate_entries(&self.scanned_barcodes, &self.invoice_items);
    }

    /// TTL the store should apply to this record in its current state
    pub fn record_ttl(&self) -> Duration {
        match self.status {
            SessionStatus::Active => ACTIVE_TTL,
            SessionStatus::Completed => COMPLETED_TTL,
            SessionStatus::Cancelled => CANCELLED_TTL,
        }
    }

    /// Slide `expiresAt` forward for a write at `now`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = crate::time::expiry_after(now, self.record_ttl());
    }

    /// Summary of what has been scanned so far
    pub fn build_summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let items: Vec<SummaryLine> = self
            .scanned_items
            .iter()
            .map(|(key, agg)| SummaryLine {
                key: key.clone(),
                item_index: agg.item_index,
                item_name: agg.item_name.clone(),
                scanned_count: agg.scanned_count,
                scanned_weight: agg.scanned_weight,
                expected_weight: agg.expected_weight,
                expected_boxes: agg.expected_boxes,
            })
            .collect();

        SessionSummary {
            token: self.token.clone(),
            chat_id: self.chat_id.clone(),
            operation_type: self.operation_type,
            document_number: self.document_number.clone(),
            total_items: items.len(),
            total_scans: self.scanned_barcodes.len(),
            total_weight: items.iter().map(|l| l.scanned_weight).sum(),
            items,
            issued_boxes: self.issued_boxes.clone(),
            generated_at: now,
        }
    }
}

/// Reject invoices with duplicate indexes or unusable quantities
pub fn validate_invoice(items: &[InvoiceItem]) -> Result<()> {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.item_index) {
            return Err(Error::InvalidInput(format!(
                "duplicate invoice itemIndex {}",
                item.item_index
            )));
        }
        if !item.quantity_kg.is_finite() || item.quantity_kg < 0.0 {
            return Err(Error::InvalidInput(format!(
                "invoice item {} has invalid quantityKg {}",
                item.item_index, item.quantity_kg
            )));
        }
        if item.name_hebrew.trim().is_empty() && item.name_english.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "invoice item {} has no name",
                item.item_index
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OcrData, OcrStatus, ScanMethod};
    use crate::time::now;

    fn tomatoes() -> InvoiceItem {
        InvoiceItem {
            item_index: 0,
            item_code: "T-1".into(),
            name_english: "Tomatoes".into(),
            name_hebrew: "עגבניות".into(),
            quantity_kg: 10.0,
            expected_boxes: 2,
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let at = now();
        let session =
            ScanSession::new("42".into(), OperationType::Scan, None, vec![tomatoes()], at).unwrap();

        assert_eq!(session.token.len(), 32);
        assert!(session.is_active());
        assert!(!session.webhook_sent);
        assert_eq!((session.expires_at - at).num_seconds(), 3600);
        assert!(session.scanned_items.is_empty());
    }

    #[test]
    fn test_invoice_validation() {
        let mut dup = tomatoes();
        dup.name_english = "Other".into();
        assert!(matches!(
            validate_invoice(&[tomatoes(), dup]),
            Err(Error::InvalidInput(_))
        ));

        let mut negative = tomatoes();
        negative.quantity_kg = -1.0;
        assert!(validate_invoice(&[negative]).is_err());

        let mut nameless = tomatoes();
        nameless.name_hebrew.clear();
        nameless.name_english.clear();
        assert!(validate_invoice(&[nameless]).is_err());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let mut session =
            ScanSession::new("42".into(), OperationType::Scan, Some("INV-9".into()), vec![tomatoes()], now())
                .unwrap();
        let mut entry = ScanEntry::pending("A".into(), None, None, ScanMethod::Barcode, now());
        entry.ocr_status = OcrStatus::Complete;
        entry.ocr_data = Some(OcrData {
            product_name: Some("עגבניות".into()),
            weight_kg: Some(4.0),
            ..Default::default()
        });
        session.scanned_barcodes.push(entry);
        session.refresh_aggregates();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["operationType"], "SCAN");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["scannedItems"]["0"]["scannedWeight"], 4.0);
        assert_eq!(json["scannedBarcodes"][0]["ocrStatus"], "complete");

        let back: ScanSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_ttl_by_status_and_summary() {
        let mut session =
            ScanSession::new("42".into(), OperationType::Scan, None, vec![tomatoes()], now()).unwrap();
        assert_eq!(session.record_ttl(), ACTIVE_TTL);
        assert!(session.ensure_active().is_ok());

        session.status = SessionStatus::Completed;
        assert_eq!(session.record_ttl(), COMPLETED_TTL);
        assert!(matches!(session.ensure_active(), Err(Error::InvalidState(_))));

        let summary = session.build_summary(now());
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.total_scans, 0);
        assert_eq!(summary.total_weight, 0.0);
    }
}
