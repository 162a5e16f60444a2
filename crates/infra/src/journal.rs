//! Write-ahead journal for dual writes.
//!
//! Approving a request writes the request table and then the ledger; recording
//! a movement writes a type log and then the history log. Before the first
//! write an intent describing both writes is appended as `PENDING`. After the
//! second it is marked `COMMITTED`. If the first write fails the intent is
//! marked `ABANDONED`. An intent with no closing row is open and is rolled
//! forward by the reconciler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};

use labstock_core::IntentId;
use labstock_inventory::{LedgerEntry, Movement};

use crate::store::{CsvTable, StoreError, TableLocks};

pub const JOURNAL_COLUMNS: [&str; 5] = ["intent_id", "kind", "state", "recorded_at", "payload"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentKind {
    Approval,
    Movement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentState {
    Pending,
    Committed,
    Abandoned,
}

/// Approval of a request: the request row is updated, then `withdrawal` is
/// appended to the material's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalIntent {
    pub request_id: String,
    pub withdrawal: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentPayload {
    Approval(ApprovalIntent),
    Movement(Movement),
}

impl IntentPayload {
    pub fn kind(&self) -> IntentKind {
        match self {
            IntentPayload::Approval(_) => IntentKind::Approval,
            IntentPayload::Movement(_) => IntentKind::Movement,
        }
    }

    fn to_json(&self) -> Result<String, StoreError> {
        Ok(match self {
            IntentPayload::Approval(intent) => serde_json::to_string(intent)?,
            IntentPayload::Movement(movement) => serde_json::to_string(movement)?,
        })
    }

    fn from_json(kind: IntentKind, json: &str) -> Result<Self, StoreError> {
        Ok(match kind {
            IntentKind::Approval => IntentPayload::Approval(serde_json::from_str(json)?),
            IntentKind::Movement => IntentPayload::Movement(serde_json::from_str(json)?),
        })
    }
}

/// One journal row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalRow {
    intent_id: IntentId,
    kind: IntentKind,
    state: IntentState,
    recorded_at: String,
    payload: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenIntent {
    pub intent_id: IntentId,
    pub recorded_at: String,
    pub payload: IntentPayload,
}

#[derive(Debug, Clone)]
pub struct Journal {
    table: CsvTable,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, locks: Arc<TableLocks>) -> Self {
        Self {
            table: CsvTable::new(path, locks),
        }
    }

    fn append(&self, row: &JournalRow) -> Result<(), StoreError> {
        let guard = self.table.lock()?;
        self.table.ensure(&guard, None, &JOURNAL_COLUMNS)?;
        self.table.append_serialized(&guard, row)
    }

    /// Record a pending intent. Must succeed before the first write starts.
    pub fn begin(&self, payload: &IntentPayload) -> Result<IntentId, StoreError> {
        let intent_id = IntentId::new();
        self.append(&JournalRow {
            intent_id,
            kind: payload.kind(),
            state: IntentState::Pending,
            recorded_at: now(),
            payload: payload.to_json()?,
        })?;
        Ok(intent_id)
    }

    pub fn commit(&self, intent_id: IntentId, kind: IntentKind) -> Result<(), StoreError> {
        self.close(intent_id, kind, IntentState::Committed)
    }

    pub fn abandon(&self, intent_id: IntentId, kind: IntentKind) -> Result<(), StoreError> {
        self.close(intent_id, kind, IntentState::Abandoned)
    }

    fn close(&self, intent_id: IntentId, kind: IntentKind, state: IntentState) -> Result<(), StoreError> {
        self.append(&JournalRow {
            intent_id,
            kind,
            state,
            recorded_at: now(),
            payload: String::new(),
        })
    }

    /// Intents with a `PENDING` row and no closing row, oldest first.
    pub fn open_intents(&self) -> Result<Vec<OpenIntent>, StoreError> {
        let Some(reader) = self.table.read()? else {
            return Ok(Vec::new());
        };
        let header = reader.header().clone();

        let mut order = Vec::new();
        let mut pending: HashMap<IntentId, JournalRow> = HashMap::new();
        for record in reader {
            let record = record?;
            let row: JournalRow = match record.deserialize(Some(&header)) {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable journal row");
                    continue;
                }
            };
            match row.state {
                IntentState::Pending => {
                    if !pending.contains_key(&row.intent_id) {
                        order.push(row.intent_id);
                    }
                    pending.insert(row.intent_id, row);
                }
                IntentState::Committed | IntentState::Abandoned => {
                    pending.remove(&row.intent_id);
                }
            }
        }

        let mut open = Vec::new();
        for intent_id in order {
            let Some(row) = pending.remove(&intent_id) else {
                continue;
            };
            open.push(OpenIntent {
                intent_id,
                recorded_at: row.recorded_at,
                payload: IntentPayload::from_json(row.kind, &row.payload)?,
            });
        }
        Ok(open)
    }
}

fn now() -> String {
    Local::now().naive_local().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
