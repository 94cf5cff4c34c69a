//! Session reconciliation engine
//!
//! Every mutation of a session record goes through [`SessionEngine::mutate`]
//! (or, for the two operations that call out while locked, an explicit
//! `with_lock` block). Both re-read the record after the lock is taken, so a
//! closure only ever sees the current record, never a snapshot from before the
//! lock.
//!
//! Operations are grouped by concern:
//! - [`session`] create, read, progress, cancel
//! - [`scan`] append, manual entries, manual resolution
//! - [`ocr`] OCR completion, failure, timeout sweep, batched status update
//! - [`issue`] issuing boxes to production
//! - [`finalize`] completion and webhook delivery

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use wbs_common::models::ScanSession;
use wbs_common::store::session_key;
use wbs_common::{time, Error, LockSettings, RecordStore, Result, SessionLock};

use crate::services::{InventoryLedger, WebhookSender};

pub mod finalize;
pub mod issue;
pub mod ocr;
pub mod scan;
pub mod session;

pub use finalize::FinalizeOutcome;
pub use issue::{IssueBoxRequest, IssueOutcome, IssueStatus};
pub use ocr::{FailOutcome, MergeOutcome, StatusUpdate, OCR_TIMEOUT_ERROR};
pub use scan::{AppendOutcome, AppendStatus, NewScan, Resolution};
pub use session::{CreateSession, CreatedSession, ProgressReport};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lock: LockSettings,
    /// Age after which a pending entry is swept to failed
    pub pending_deadline: Duration,
    /// Base of the scan page URL handed out at creation
    pub public_base_url: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock: LockSettings::default(),
            pending_deadline: Duration::from_secs(40),
            public_base_url: "http://localhost:5790".to_string(),
        }
    }
}

/// What a critical section decided to do with the record
pub(crate) enum Mutation<T> {
    /// Persist the mutated record
    Save(T),
    /// Leave the stored record untouched
    Skip(T),
}

/// Result of a critical section plus the record as it stands afterwards
pub(crate) struct Committed<T> {
    pub value: T,
    pub session: ScanSession,
}

/// Lock-protected operations over scan session records
#[derive(Clone)]
pub struct SessionEngine {
    store: Arc<dyn RecordStore>,
    lock: SessionLock,
    webhook: Arc<dyn WebhookSender>,
    ledger: Arc<dyn InventoryLedger>,
    settings: Arc<EngineSettings>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        webhook: Arc<dyn WebhookSender>,
        ledger: Arc<dyn InventoryLedger>,
        settings: EngineSettings,
    ) -> Self {
        let lock = SessionLock::new(Arc::clone(&store), settings.lock);
        Self {
            store,
            lock,
            webhook,
            ledger,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Read a session record; [`Error::NotFound`] when absent or expired
    pub(crate) async fn load(&self, token: &str) -> Result<ScanSession> {
        match self.store.get(&session_key(token)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(Error::NotFound(format!("session {}", token))),
        }
    }

    /// Write a session record with the TTL its status calls for
    pub(crate) async fn save(&self, session: &ScanSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.store
            .set(&session_key(&session.token), &raw, session.record_ttl())
            .await
    }

    /// Read-modify-write `token` under its lock
    ///
    /// `apply` receives the record re-read inside the lock and the current
    /// time. On [`Mutation::Save`] the aggregates are rebuilt, the expiry
    /// slides forward and the record is written back.
    pub(crate) async fn mutate<T, F>(&self, token: &str, apply: F) -> Result<Committed<T>>
    where
        F: FnOnce(&mut ScanSession, DateTime<Utc>) -> Result<Mutation<T>> + Send,
        T: Send,
    {
        self.lock
            .with_lock(token, || async move {
                let mut session = self.load(token).await?;
                let now = time::now();
                let value = match apply(&mut session, now)? {
                    Mutation::Save(value) => {
                        session.refresh_aggregates();
                        session.touch(now);
                        self.save(&session).await?;
                        value
                    }
                    Mutation::Skip(value) => value,
                };
                Ok(Committed { value, session })
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory collaborators for engine tests

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use wbs_common::models::{InvoiceItem, OperationType};
    use wbs_common::{LockSettings, MemoryStore};

    use super::*;
    use crate::services::{DeliveryError, IssueRequest, LedgerError, WebhookPayload};

    /// Webhook counting deliveries; fails while `failing` is set
    #[derive(Default)]
    pub struct RecordingWebhook {
        pub deliveries: AtomicUsize,
        pub failing: AtomicBool,
    }

    #[async_trait]
    impl WebhookSender for RecordingWebhook {
        async fn deliver(&self, _payload: &WebhookPayload<'_>) -> std::result::Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::Rejected(500, "receiver down".into()));
            }
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Ledger handing out sequential transaction ids
    #[derive(Default)]
    pub struct CountingLedger {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl InventoryLedger for CountingLedger {
        async fn record_issue(&self, _request: &IssueRequest<'_>) -> std::result::Result<String, LedgerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("tx-{}", n))
        }
    }

    pub struct Harness {
        pub engine: SessionEngine,
        pub store: Arc<MemoryStore>,
        pub webhook: Arc<RecordingWebhook>,
        pub ledger: Arc<CountingLedger>,
    }

    pub fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let webhook = Arc::new(RecordingWebhook::default());
        let ledger = Arc::new(CountingLedger::default());
        let settings = EngineSettings {
            lock: LockSettings {
                max_retries: 200,
                retry_delay_ms: 5,
                ttl_seconds: 10,
            },
            ..EngineSettings::default()
        };
        let engine = SessionEngine::new(
            store.clone(),
            webhook.clone(),
            ledger.clone(),
            settings,
        );
        Harness {
            engine,
            store,
            webhook,
            ledger,
        }
    }

    /// `{quantityKg: 10, expectedBoxes}` tomatoes line
    pub fn tomatoes(expected_boxes: u32) -> InvoiceItem {
        InvoiceItem {
            item_index: 0,
            item_code: "T-100".into(),
            name_english: "Tomatoes".into(),
            name_hebrew: "עגבניות".into(),
            quantity_kg: 10.0,
            expected_boxes,
        }
    }

    pub fn cucumbers() -> InvoiceItem {
        InvoiceItem {
            item_index: 1,
            item_code: "C-200".into(),
            name_english: "Cucumbers".into(),
            name_hebrew: "מלפפונים".into(),
            quantity_kg: 8.0,
            expected_boxes: 2,
        }
    }

    pub async fn create(h: &Harness, op: OperationType, items: Vec<InvoiceItem>) -> String {
        h.engine
            .create_session(CreateSession {
                chat_id: "1001".into(),
                operation_type: op,
                document_number: Some("INV-77".into()),
                invoice_items: items,
            })
            .await
            .unwrap()
            .token
    }

    pub fn barcode(code: &str) -> NewScan {
        NewScan {
            barcode: code.into(),
            image_url: Some(format!("https://img.example/{}.jpg", code)),
            image_public_id: Some(code.into()),
            scan_method: wbs_common::models::ScanMethod::Barcode,
        }
    }
}
