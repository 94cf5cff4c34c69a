//! ISSUE workflow: booking boxes out of stock
//!
//! The ledger call happens while the session lock is held, so two requests
//! for the same barcode cannot both book it.

use serde::{Deserialize, Serialize};

use wbs_common::models::{usable_weight, IssuedBox, OperationType};
use wbs_common::{time, Error, Result};

use super::SessionEngine;
use crate::services::IssueRequest;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueBoxRequest {
    pub barcode: String,
    pub item_index: u32,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Issued,
    /// Barcode already issued in this session; the existing record is returned
    Duplicate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueOutcome {
    pub status: IssueStatus,
    pub issued_box: IssuedBox,
}

impl SessionEngine {
    /// Issue one box to production through the inventory ledger
    pub async fn issue_box(&self, token: &str, request: IssueBoxRequest) -> Result<IssueOutcome> {
        let barcode = request.barcode.trim().to_string();
        if barcode.is_empty() {
            return Err(Error::InvalidInput("barcode is required".to_string()));
        }
        let weight_kg = usable_weight(Some(request.weight_kg)).ok_or_else(|| {
            Error::InvalidInput(format!(
                "weightKg must be a positive number, got {}",
                request.weight_kg
            ))
        })?;

        self.lock
            .with_lock(token, || async move {
                let mut session = self.load(token).await?;
                session.ensure_active()?;
                if session.operation_type != OperationType::Issue {
                    return Err(Error::InvalidState(format!(
                        "session {} is not an ISSUE session",
                        token
                    )));
                }

                if let Some(existing) = session.issued_boxes.iter().find(|b| b.barcode == barcode) {
                    tracing::info!(token, barcode = %barcode, "Box already issued");
                    return Ok(IssueOutcome {
                        status: IssueStatus::Duplicate,
                        issued_box: existing.clone(),
                    });
                }

                let item = session
                    .invoice_item(request.item_index)
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("invoice has no item {}", request.item_index))
                    })?
                    .clone();

                let transaction_id = self
                    .ledger
                    .record_issue(&IssueRequest {
                        session_token: token,
                        document_number: session.document_number.as_deref(),
                        barcode: &barcode,
                        item_code: &item.item_code,
                        weight_kg,
                    })
                    .await
                    .map_err(|e| Error::Delivery(format!("ledger: {}", e)))?;

                let now = time::now();
                let issued_box = IssuedBox {
                    barcode: barcode.clone(),
                    item_index: item.item_index,
                    item_code: item.item_code.clone(),
                    weight_kg,
                    transaction_id,
                    issued_at: now,
                };
                session.issued_boxes.push(issued_box.clone());
                session.touch(now);
                self.save(&session).await?;

                tracing::info!(
                    token,
                    barcode = %barcode,
                    transaction_id = %issued_box.transaction_id,
                    weight_kg,
                    "Box issued to production"
                );
                Ok(IssueOutcome {
                    status: IssueStatus::Issued,
                    issued_box,
                })
            })
            .await
    }
}
