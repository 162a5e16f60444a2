//! Lab sample results. A plain append with no ledger interaction.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::InventoryResult;
use crate::store::{CsvTable, TableLocks};

pub const LAB_DATA_COLUMNS: [&str; 9] = [
    "sample_id",
    "batch_id",
    "order_number",
    "product",
    "moisture",
    "purity",
    "analyst",
    "sample_date",
    "sample_time",
];

/// Field order matches [`LAB_DATA_COLUMNS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSample {
    pub sample_id: String,
    pub batch_id: String,
    pub order_number: String,
    pub product: String,
    pub moisture: String,
    pub purity: String,
    pub analyst: String,
    pub sample_date: String,
    pub sample_time: String,
}

#[derive(Debug, Clone)]
pub struct LabSampleRecorder {
    table: CsvTable,
}

impl LabSampleRecorder {
    pub fn new(path: impl Into<PathBuf>, locks: Arc<TableLocks>) -> Self {
        Self {
            table: CsvTable::new(path, locks),
        }
    }

    pub fn record(&self, sample: &LabSample) -> InventoryResult<()> {
        let guard = self.table.lock()?;
        self.table.ensure(&guard, None, &LAB_DATA_COLUMNS)?;
        self.table.append_serialized(&guard, sample)?;
        tracing::info!(sample_id = %sample.sample_id, product = %sample.product, "lab sample saved");
        Ok(())
    }

    /// Every saved sample, oldest first.
    pub fn samples(&self) -> InventoryResult<Vec<LabSample>> {
        let Some(reader) = self.table.read()? else {
            return Ok(Vec::new());
        };
        let header = reader.header().clone();
        let mut samples = Vec::new();
        for record in reader {
            let record = record?;
            match record.deserialize::<LabSample>(Some(&header)) {
                Ok(sample) => samples.push(sample),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable lab data row"),
            }
        }
        Ok(samples)
    }
}
