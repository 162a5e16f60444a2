//! Synchronous operations over the stores.
//!
//! Every operation opens the tables it needs fresh, takes the per-table lock
//! for each read-modify-write and releases it before the next table is
//! touched. Dual writes are bracketed by a journal intent.

pub mod intake;
pub mod labdata;
pub mod movements;
pub mod overview;
pub mod requests;

use chrono::{Local, NaiveDateTime};

use labstock_inventory::Material;

use crate::config::{LockSettings, Settings, StorePaths};
use crate::journal::Journal;
use crate::ledger_store::LedgerStore;
use crate::reconcile::Reconciler;
use crate::request_store::RequestStore;
use crate::store::TableLocks;

pub use intake::{IntakeOutcome, StockIntake, StockReceipt};
pub use labdata::{LabSample, LabSampleRecorder};
pub use movements::{ConsistencyReport, MovementRecorder};
pub use overview::{BalanceOverview, MaterialBalance};
pub use requests::{DecisionOutcome, NewRequest, RequestWorkflow};

/// All lab services over one set of stores.
#[derive(Debug, Clone)]
pub struct LabServices {
    pub intake: StockIntake,
    pub requests: RequestWorkflow,
    pub movements: MovementRecorder,
    pub samples: LabSampleRecorder,
    pub overview: BalanceOverview,
    journal: Journal,
}

impl LabServices {
    pub fn new(paths: &StorePaths, locks: &LockSettings, materials: &[String]) -> Self {
        let locks = TableLocks::new(locks.timeout());
        let ledger = LedgerStore::new(&paths.ledger_dir, locks.clone());
        let journal = Journal::new(&paths.journal, locks.clone());
        let request_store = RequestStore::new(&paths.requests, locks.clone());

        let configured = materials
            .iter()
            .filter_map(|name| match Material::parse(name) {
                Ok(material) => Some(material),
                Err(err) => {
                    tracing::warn!(material = %name, error = %err, "ignoring configured material");
                    None
                }
            })
            .collect();

        Self {
            intake: StockIntake::new(ledger.clone()),
            requests: RequestWorkflow::new(request_store, ledger.clone(), journal.clone()),
            movements: MovementRecorder::new(paths, locks.clone(), journal.clone()),
            samples: LabSampleRecorder::new(&paths.lab_data, locks),
            overview: BalanceOverview::new(ledger, configured),
            journal,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.store_paths(),
            &settings.locks,
            &settings.inventory.materials,
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.journal.clone(),
            self.requests.clone(),
            self.movements.clone(),
        )
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// `value` trimmed, or the current date/time rendered with `format` when blank.
pub(crate) fn or_now(value: &str, format: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        now().format(format).to_string()
    } else {
        trimmed.to_string()
    }
}
