//! Balances of every known material.

use std::collections::HashMap;

use serde::Serialize;

use labstock_inventory::Material;

use crate::error::InventoryResult;
use crate::ledger_store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBalance {
    pub material: String,
    pub balance: f64,
}

#[derive(Debug, Clone)]
pub struct BalanceOverview {
    ledger: LedgerStore,
    configured: Vec<Material>,
}

impl BalanceOverview {
    pub fn new(ledger: LedgerStore, configured: Vec<Material>) -> Self {
        Self { ledger, configured }
    }

    /// Balance of one material; 0 when it has no ledger yet.
    pub fn balance(&self, material: &str) -> InventoryResult<MaterialBalance> {
        let material = Material::parse(material)?;
        let balance = self.ledger.table(&material).balance()?;
        Ok(MaterialBalance {
            material: material.name().to_string(),
            balance,
        })
    }

    /// Configured materials plus every ledger on disk, sorted by name.
    /// A ledger that cannot be read is left out and logged.
    pub fn balances(&self) -> InventoryResult<Vec<MaterialBalance>> {
        let mut known: HashMap<String, Material> = HashMap::new();
        for material in &self.configured {
            known.insert(material.table_key().to_string(), material.clone());
        }
        for material in self.ledger.materials()? {
            known.entry(material.table_key().to_string()).or_insert(material);
        }

        let mut balances = Vec::with_capacity(known.len());
        for material in known.into_values() {
            match self.ledger.table(&material).balance() {
                Ok(balance) => balances.push(MaterialBalance {
                    material: material.name().to_string(),
                    balance,
                }),
                Err(err) => {
                    tracing::warn!(material = material.name(), error = %err, "skipping unreadable ledger")
                }
            }
        }
        balances.sort_by(|a, b| {
            a.material
                .to_lowercase()
                .cmp(&b.material.to_lowercase())
                .then_with(|| a.material.cmp(&b.material))
        });
        Ok(balances)
    }
}
