//! Roll-forward of journal intents left open by a failed second write.
//!
//! An open intent whose first write is visible is completed: the missing
//! ledger withdrawal or history row is appended unless already present, and
//! the intent is marked committed. An open intent whose first write never
//! landed is marked abandoned. Running the reconciler again changes nothing.

use serde::Serialize;

use labstock_core::{IntentId, RequestId};
use labstock_inventory::RequestStatus;

use crate::error::{InventoryError, InventoryResult};
use crate::journal::{ApprovalIntent, IntentKind, IntentPayload, Journal, OpenIntent};
use crate::services::{MovementRecorder, RequestWorkflow};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Intents whose second write was missing and has been appended.
    pub repaired: usize,
    /// Intents whose writes were both present.
    pub consistent: usize,
    /// Intents whose first write never happened.
    pub abandoned: usize,
    /// Intents that could not be processed this run; they stay open.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Repaired,
    Consistent,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    journal: Journal,
    requests: RequestWorkflow,
    movements: MovementRecorder,
}

impl Reconciler {
    pub fn new(journal: Journal, requests: RequestWorkflow, movements: MovementRecorder) -> Self {
        Self {
            journal,
            requests,
            movements,
        }
    }

    pub fn run(&self) -> InventoryResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for intent in self.journal.open_intents()? {
            match self.resolve(&intent) {
                Ok(Resolution::Repaired) => report.repaired += 1,
                Ok(Resolution::Consistent) => report.consistent += 1,
                Ok(Resolution::Abandoned) => report.abandoned += 1,
                Err(err) => {
                    tracing::error!(intent_id = %intent.intent_id, error = %err, "could not reconcile intent");
                    report.failed += 1;
                }
            }
        }
        if report != ReconcileReport::default() {
            tracing::info!(
                repaired = report.repaired,
                consistent = report.consistent,
                abandoned = report.abandoned,
                failed = report.failed,
                "journal reconciled"
            );
        }
        Ok(report)
    }

    fn resolve(&self, intent: &OpenIntent) -> InventoryResult<Resolution> {
        let kind = intent.payload.kind();
        let resolution = match &intent.payload {
            IntentPayload::Approval(approval) => self.resolve_approval(approval)?,
            IntentPayload::Movement(movement) => {
                if !self.movements.type_log_contains(&movement.key())? {
                    Resolution::Abandoned
                } else if self.movements.complete_history(movement)? {
                    Resolution::Repaired
                } else {
                    Resolution::Consistent
                }
            }
        };
        self.close(intent.intent_id, kind, resolution)?;
        if resolution == Resolution::Repaired {
            tracing::warn!(intent_id = %intent.intent_id, kind = ?kind, "rolled forward partial write");
        }
        Ok(resolution)
    }

    fn resolve_approval(&self, approval: &ApprovalIntent) -> InventoryResult<Resolution> {
        let request_id: RequestId = approval.request_id.parse()?;
        let snapshot = self.requests.store().load()?;
        let approved = match snapshot.find(&request_id) {
            Some((_, Ok(request))) => request.status == RequestStatus::Approved,
            Some((_, Err(err))) => {
                return Err(InventoryError::Store(format!(
                    "request {request_id} row is unreadable: {err}"
                )));
            }
            None => false,
        };
        if !approved {
            return Ok(Resolution::Abandoned);
        }
        if self.requests.complete_withdrawal(approval)? {
            Ok(Resolution::Repaired)
        } else {
            Ok(Resolution::Consistent)
        }
    }

    fn close(&self, intent_id: IntentId, kind: IntentKind, resolution: Resolution) -> InventoryResult<()> {
        match resolution {
            Resolution::Abandoned => self.journal.abandon(intent_id, kind)?,
            Resolution::Repaired | Resolution::Consistent => self.journal.commit(intent_id, kind)?,
        }
        Ok(())
    }
}
