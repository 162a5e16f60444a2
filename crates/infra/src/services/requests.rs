//! Borrow request workflow: create, list, decide.

use serde::{Deserialize, Serialize};

use labstock_core::{Aggregate, RequestId};
use labstock_inventory::{
    BorrowRequest, DecideRequest, Decision, LedgerEntry, Material, OpenRequest, RequestCommand,
    RequestStatus,
};

use crate::error::{InventoryError, InventoryResult};
use crate::journal::{ApprovalIntent, IntentKind, IntentPayload, Journal};
use crate::ledger_store::LedgerStore;
use crate::request_store::RequestStore;

use super::now;

/// A borrow request as submitted by a requester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRequest {
    pub material: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub request_date: String,
    pub request_time: String,
    pub remarks: String,
}

impl NewRequest {
    fn command(&self, request_id: RequestId) -> RequestCommand {
        RequestCommand::Open(OpenRequest {
            request_id,
            material: self.material.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            purpose: self.purpose.clone(),
            employee_name: self.employee_name.clone(),
            employee_id: self.employee_id.clone(),
            request_date: self.request_date.clone(),
            request_time: self.request_time.clone(),
            remarks: self.remarks.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub request: BorrowRequest,
    /// Ledger balance after the withdrawal; `None` for rejections.
    pub new_balance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RequestWorkflow {
    store: RequestStore,
    ledger: LedgerStore,
    journal: Journal,
}

impl RequestWorkflow {
    pub fn new(store: RequestStore, ledger: LedgerStore, journal: Journal) -> Self {
        Self {
            store,
            ledger,
            journal,
        }
    }

    pub(crate) fn store(&self) -> &RequestStore {
        &self.store
    }

    /// Open a Pending request under a fresh id.
    pub fn create(&self, input: &NewRequest) -> InventoryResult<BorrowRequest> {
        // Reject bad input before touching the table.
        let probe_id = RequestId::generate();
        BorrowRequest::empty(probe_id.clone()).handle(&input.command(probe_id))?;

        let guard = self.store.lock()?;
        let snapshot = self.store.load()?;
        let mut request_id = RequestId::generate();
        while snapshot.contains(&request_id) {
            request_id = RequestId::generate();
        }

        let mut request = BorrowRequest::empty(request_id.clone());
        request.execute(&input.command(request_id))?;
        self.store.append(&guard, &request)?;
        drop(guard);

        tracing::info!(
            request_id = %request.request_id,
            material = %request.material,
            quantity = request.quantity,
            employee = %request.employee_name,
            "borrow request created"
        );
        Ok(request)
    }

    /// Requests in insertion order, optionally only those with `status`.
    pub fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> InventoryResult<impl Iterator<Item = InventoryResult<BorrowRequest>>> {
        let requests = self.store.requests()?;
        Ok(requests
            .map(|r| r.map_err(InventoryError::from))
            .filter(move |r| match (r, status) {
                (Ok(request), Some(wanted)) => request.status == wanted,
                _ => true,
            }))
    }

    /// Approve or reject a Pending request.
    ///
    /// Approval updates the request row and then appends an OUT row to the
    /// material's ledger. The balance may go negative. If the ledger write
    /// fails the request stays Approved and `PartialWrite` is returned; the
    /// journal intent lets the reconciler finish the withdrawal.
    pub fn decide(
        &self,
        request_id: &RequestId,
        decision: Decision,
        approver: &str,
    ) -> InventoryResult<DecisionOutcome> {
        let guard = self.store.lock()?;
        let snapshot = self.store.load()?;
        let (position, request) = snapshot
            .find(request_id)
            .ok_or_else(|| InventoryError::NotFound(format!("request {request_id}")))?;
        let mut request = request.map_err(|e| {
            InventoryError::Store(format!("request {request_id} row is unreadable: {e}"))
        })?;

        let decided_at = now();
        request.execute(&RequestCommand::Decide(DecideRequest {
            request_id: request_id.clone(),
            decision,
            approver: approver.to_string(),
            decided_at,
        }))?;

        if decision == Decision::Reject {
            self.store.save_decision(&guard, snapshot, position, &request)?;
            tracing::info!(request_id = %request_id, approver, "borrow request rejected");
            return Ok(DecisionOutcome {
                request,
                new_balance: None,
            });
        }

        let material = Material::parse(&request.material)?;
        let withdrawal = request.withdrawal(decided_at);
        let intent_id = self.journal.begin(&IntentPayload::Approval(ApprovalIntent {
            request_id: request_id.to_string(),
            withdrawal: withdrawal.clone(),
        }))?;

        if let Err(err) = self.store.save_decision(&guard, snapshot, position, &request) {
            if let Err(journal_err) = self.journal.abandon(intent_id, IntentKind::Approval) {
                tracing::warn!(%intent_id, error = %journal_err, "failed to abandon intent");
            }
            return Err(err.into());
        }
        drop(guard);

        let new_balance = match self.withdraw(&material, &withdrawal) {
            Ok(balance) => balance,
            Err(err) => {
                tracing::error!(
                    %intent_id,
                    request_id = %request_id,
                    material = material.name(),
                    error = %err,
                    "request approved but ledger withdrawal failed"
                );
                return Err(InventoryError::PartialWrite {
                    intent_id,
                    completed: "request status update",
                    failed: "ledger withdrawal",
                    source: Box::new(err),
                });
            }
        };

        if let Err(err) = self.journal.commit(intent_id, IntentKind::Approval) {
            tracing::warn!(%intent_id, error = %err, "approval written but intent not marked committed");
        }
        tracing::info!(
            request_id = %request_id,
            approver,
            material = material.name(),
            quantity = request.quantity,
            new_balance,
            "borrow request approved"
        );
        Ok(DecisionOutcome {
            request,
            new_balance: Some(new_balance),
        })
    }

    /// Append `withdrawal` to the material's ledger under its lock.
    pub(crate) fn withdraw(&self, material: &Material, withdrawal: &LedgerEntry) -> InventoryResult<f64> {
        let table = self.ledger.table(material);
        let guard = table.lock()?;
        let balance = table.append(&guard, withdrawal)?;
        if balance < 0.0 {
            tracing::warn!(
                material = material.name(),
                balance,
                reference = %withdrawal.reference,
                "withdrawal left a negative balance"
            );
        }
        Ok(balance)
    }

    /// Finish an approval whose ledger write may be missing. Returns whether
    /// a row was appended.
    pub(crate) fn complete_withdrawal(&self, intent: &ApprovalIntent) -> InventoryResult<bool> {
        let material = Material::parse(&intent.withdrawal.material)?;
        let table = self.ledger.table(&material);
        let guard = table.lock()?;
        if table.has_withdrawal_for(&intent.request_id)? {
            return Ok(false);
        }
        table.append(&guard, &intent.withdrawal)?;
        Ok(true)
    }
}
