//! Inbound deliveries.

use serde::{Deserialize, Serialize};

use labstock_inventory::quantity::positive;
use labstock_inventory::{LedgerEntry, Material, TransactionType};

use crate::error::InventoryResult;
use crate::ledger_store::LedgerStore;

use super::or_now;

/// A delivery as received at the stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockReceipt {
    pub material: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub supplier: String,
    pub invoice_no: String,
    pub date: String,
    pub time: String,
    pub remarks: String,
    pub received_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeOutcome {
    pub material: String,
    pub new_balance: f64,
}

#[derive(Debug, Clone)]
pub struct StockIntake {
    ledger: LedgerStore,
}

impl StockIntake {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Append an IN row to the material's ledger, creating the ledger on
    /// first use, and return the new balance.
    pub fn receive(&self, receipt: &StockReceipt) -> InventoryResult<IntakeOutcome> {
        let material = Material::parse(&receipt.material)?;
        let quantity = positive("quantity", receipt.quantity)?;

        let entry = LedgerEntry {
            date: or_now(&receipt.date, "%Y-%m-%d"),
            time: or_now(&receipt.time, "%H:%M"),
            transaction_type: TransactionType::In,
            material: material.name().to_string(),
            quantity,
            unit: receipt.unit.trim().to_string(),
            counterparty: receipt.supplier.trim().to_string(),
            reference: receipt.invoice_no.trim().to_string(),
            received_by: receipt.received_by.trim().to_string(),
            remarks: receipt.remarks.trim().to_string(),
        };

        let table = self.ledger.table(&material);
        let guard = table.lock()?;
        let new_balance = table.append(&guard, &entry)?;
        drop(guard);

        tracing::info!(
            material = material.name(),
            quantity,
            new_balance,
            supplier = %entry.counterparty,
            "stock received"
        );
        Ok(IntakeOutcome {
            material: material.name().to_string(),
            new_balance,
        })
    }
}
