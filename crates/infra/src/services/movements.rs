//! Tanker arrivals and dispatches.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use labstock_inventory::movement::HISTORY_COLUMNS;
use labstock_inventory::{HistoryEntry, Movement, MovementDraft, MovementKey, MovementType};

use crate::config::StorePaths;
use crate::error::{InventoryError, InventoryResult};
use crate::journal::{IntentKind, IntentPayload, Journal};
use crate::store::{cells, CsvTable, StoreError, TableLocks};

/// Outcome of comparing the type logs with the history log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Type-log rows with no history row.
    pub missing: Vec<MovementKey>,
    /// Keys with more than one history row.
    pub duplicated: Vec<MovementKey>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MovementRecorder {
    arrivals: CsvTable,
    dispatches: CsvTable,
    history: CsvTable,
    journal: Journal,
}

impl MovementRecorder {
    pub fn new(paths: &StorePaths, locks: Arc<TableLocks>, journal: Journal) -> Self {
        Self {
            arrivals: CsvTable::new(&paths.arrivals, Arc::clone(&locks)),
            dispatches: CsvTable::new(&paths.dispatches, Arc::clone(&locks)),
            history: CsvTable::new(&paths.history, locks),
            journal,
        }
    }

    fn type_log(&self, movement_type: MovementType) -> &CsvTable {
        match movement_type {
            MovementType::Arrival => &self.arrivals,
            MovementType::Dispatch => &self.dispatches,
        }
    }

    /// Record a movement in its type log and then in the history log.
    ///
    /// A failure of the history write after the type-log write returns
    /// `PartialWrite`; the type-log row is kept and the open journal intent
    /// lets the reconciler add the history row later.
    pub fn record(&self, draft: MovementDraft) -> InventoryResult<Movement> {
        let movement = draft.validate()?;
        let movement_type = movement.movement_type();
        let intent_id = self.journal.begin(&IntentPayload::Movement(movement.clone()))?;

        if let Err(err) = self.append_type_row(&movement) {
            if let Err(journal_err) = self.journal.abandon(intent_id, IntentKind::Movement) {
                tracing::warn!(%intent_id, error = %journal_err, "failed to abandon intent");
            }
            return Err(err.into());
        }

        if let Err(err) = self.append_history(&movement) {
            tracing::error!(
                %intent_id,
                tanker_id = %movement.tanker_id,
                movement_type = %movement_type,
                error = %err,
                "movement logged but history write failed"
            );
            return Err(InventoryError::PartialWrite {
                intent_id,
                completed: match movement_type {
                    MovementType::Arrival => "arrival log",
                    MovementType::Dispatch => "dispatch log",
                },
                failed: "history log",
                source: Box::new(err.into()),
            });
        }

        if let Err(err) = self.journal.commit(intent_id, IntentKind::Movement) {
            tracing::warn!(%intent_id, error = %err, "movement written but intent not marked committed");
        }
        tracing::info!(
            tanker_id = %movement.tanker_id,
            movement_type = %movement_type,
            material = %movement.material_or_product,
            quantity = movement.quantity,
            "tanker movement recorded"
        );
        Ok(movement)
    }

    pub(crate) fn append_type_row(&self, movement: &Movement) -> Result<(), StoreError> {
        let table = self.type_log(movement.movement_type());
        let guard = table.lock()?;
        table.ensure(&guard, None, movement.movement_type().columns())?;
        table.append(&guard, movement.type_log_row())
    }

    pub(crate) fn append_history(&self, movement: &Movement) -> Result<(), StoreError> {
        let guard = self.history.lock()?;
        self.history.ensure(&guard, None, &HISTORY_COLUMNS)?;
        self.history.append(&guard, movement.history_entry().to_row())
    }

    /// Append the history row for `movement` unless one with its key exists.
    /// Returns whether a row was appended.
    pub(crate) fn complete_history(&self, movement: &Movement) -> Result<bool, StoreError> {
        let key = movement.key();
        let guard = self.history.lock()?;
        if self.history_count(&key)? > 0 {
            return Ok(false);
        }
        self.history.ensure(&guard, None, &HISTORY_COLUMNS)?;
        self.history.append(&guard, movement.history_entry().to_row())?;
        Ok(true)
    }

    pub(crate) fn type_log_contains(&self, key: &MovementKey) -> Result<bool, StoreError> {
        for found in self.type_keys(key.movement_type)? {
            if &found? == key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn history_count(&self, key: &MovementKey) -> Result<usize, StoreError> {
        let mut count = 0;
        for entry in self.history_entries()? {
            if &entry?.key() == key {
                count += 1;
            }
        }
        Ok(count)
    }

    fn type_keys(
        &self,
        movement_type: MovementType,
    ) -> Result<impl Iterator<Item = Result<MovementKey, StoreError>>, StoreError> {
        let reader = self.type_log(movement_type).read()?;
        Ok(reader.into_iter().flatten().filter_map(move |record| match record {
            Ok(record) => MovementKey::from_type_log_row(movement_type, &cells(&record)).map(Ok),
            Err(err) => Some(Err(err)),
        }))
    }

    fn history_entries(&self) -> Result<impl Iterator<Item = Result<HistoryEntry, StoreError>>, StoreError> {
        let reader = self.history.read()?;
        Ok(reader.into_iter().flatten().filter_map(|record| match record {
            Ok(record) => match HistoryEntry::from_row(&cells(&record)) {
                Ok(entry) => Some(Ok(entry)),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable history row");
                    None
                }
            },
            Err(err) => Some(Err(err)),
        }))
    }

    /// History rows in insertion order.
    pub fn history(&self) -> InventoryResult<impl Iterator<Item = InventoryResult<HistoryEntry>>> {
        Ok(self.history_entries()?.map(|r| r.map_err(InventoryError::from)))
    }

    /// Compare both type logs with the history log.
    pub fn verify(&self) -> InventoryResult<ConsistencyReport> {
        let mut counts: HashMap<MovementKey, usize> = HashMap::new();
        for entry in self.history_entries()? {
            *counts.entry(entry?.key()).or_default() += 1;
        }

        let mut report = ConsistencyReport::default();
        for movement_type in [MovementType::Arrival, MovementType::Dispatch] {
            for key in self.type_keys(movement_type)? {
                let key = key?;
                if !counts.contains_key(&key) {
                    report.missing.push(key);
                }
            }
        }
        report.duplicated = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(key, _)| key)
            .collect();
        report.duplicated.sort();

        if !report.is_clean() {
            tracing::warn!(
                missing = report.missing.len(),
                duplicated = report.duplicated.len(),
                "movement logs are inconsistent"
            );
        }
        Ok(report)
    }
}
