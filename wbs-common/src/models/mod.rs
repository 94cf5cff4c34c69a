//! Scan session data model

mod aggregate;
mod entry;
mod progress;
mod session;

pub use aggregate::{aggregate_entries, contribution_of, Contribution, ItemAggregate, ItemKey};
pub use entry::{usable_weight, ManualEntry, OcrData, OcrStatus, ScanEntry, ScanMethod, Transition};
pub use progress::{IssueKind, ScanIssue, SessionProgress};
pub use session::{
    validate_invoice, InvoiceItem, IssuedBox, OperationType, ScanSession, SessionStatus,
    SessionSummary, SummaryLine, ACTIVE_TTL, CANCELLED_TTL, COMPLETED_TTL,
};
