//! Per-material ledger tables.
//!
//! Each material has one CSV table under the ledger directory, named by the
//! material's canonical key. New tables carry a `#schema=current` tag line;
//! untagged tables are classified once from their header.

use std::path::PathBuf;
use std::sync::Arc;

use labstock_inventory::{
    BalanceCalculator, LedgerEntry, LedgerLayout, Material, SchemaVersion, CURRENT_COLUMNS,
};
use labstock_inventory::quantity::round3;

use crate::store::{cells, CsvTable, StoreError, TableGuard, TableLocks, TableReader};

pub const LEDGER_EXTENSION: &str = "csv";

#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
    locks: Arc<TableLocks>,
}

impl LedgerStore {
    pub fn new(dir: impl Into<PathBuf>, locks: Arc<TableLocks>) -> Self {
        Self {
            dir: dir.into(),
            locks,
        }
    }

    /// The material's table. Nothing is created until the first append.
    pub fn table(&self, material: &Material) -> LedgerTable {
        let path = self
            .dir
            .join(format!("{}.{LEDGER_EXTENSION}", material.table_key()));
        LedgerTable {
            material: material.clone(),
            table: CsvTable::new(path, Arc::clone(&self.locks)),
        }
    }

    /// Materials with a table on disk.
    pub fn materials(&self) -> Result<Vec<Material>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let material = match Material::from_table_key(stem) {
                Ok(material) => material,
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unrecognised ledger file");
                    continue;
                }
            };
            // Prefer the spelling recorded in the ledger over the file name.
            let table = self.table(&material);
            match table.recorded_material() {
                Ok(Some(recorded)) => found.push(recorded),
                Ok(None) => found.push(material),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unreadable ledger file")
                }
            }
        }
        Ok(found)
    }
}

/// One material's ledger.
#[derive(Debug, Clone)]
pub struct LedgerTable {
    material: Material,
    table: CsvTable,
}

/// The snapshot a balance computation produced.
struct Snapshot {
    layout: LedgerLayout,
    calculator: BalanceCalculator,
}

impl LedgerTable {
    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn lock(&self) -> Result<TableGuard, StoreError> {
        self.table.lock()
    }

    pub fn exists(&self) -> Result<bool, StoreError> {
        self.table.exists()
    }

    fn layout_of(&self, reader: &TableReader) -> Result<LedgerLayout, StoreError> {
        let tag = match reader.tag().and_then(SchemaVersion::from_tag_line) {
            Some(parsed) => Some(parsed.map_err(|e| StoreError::format(self.table.name(), e.to_string()))?),
            None => None,
        };
        LedgerLayout::resolve(tag, &cells(reader.header()))
            .map_err(|e| StoreError::format(self.table.name(), e.to_string()))
    }

    /// The table's layout, or `None` if it has not been created.
    pub fn layout(&self) -> Result<Option<LedgerLayout>, StoreError> {
        match self.table.read()? {
            Some(reader) => self.layout_of(&reader).map(Some),
            None => Ok(None),
        }
    }

    /// Every row in insertion order. Each call starts a fresh pass.
    pub fn rows(&self) -> Result<impl Iterator<Item = Result<csv::StringRecord, StoreError>>, StoreError> {
        Ok(self.table.read()?.into_iter().flatten())
    }

    fn snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        let Some(reader) = self.table.read()? else {
            return Ok(None);
        };
        let layout = self.layout_of(&reader)?;
        let mut calculator = layout.balance_calculator();
        for record in reader {
            calculator.observe(&cells(&record?));
        }
        if calculator.ignored_cells() > 0 {
            tracing::warn!(
                material = self.material.name(),
                ignored = calculator.ignored_cells(),
                "ledger has non-numeric quantity or balance cells; treated as empty"
            );
        }
        Ok(Some(Snapshot { layout, calculator }))
    }

    /// The material name written in the table's first row, when it maps to
    /// this table.
    pub fn recorded_material(&self) -> Result<Option<Material>, StoreError> {
        let Some(mut reader) = self.table.read()? else {
            return Ok(None);
        };
        let layout = self.layout_of(&reader)?;
        let Some(first) = reader.next().transpose()? else {
            return Ok(None);
        };
        Ok(layout
            .material(&cells(&first))
            .and_then(|name| Material::parse(name).ok())
            .filter(|m| m == &self.material))
    }

    /// Current balance, rounded to three places. An absent table is 0.
    pub fn balance(&self) -> Result<f64, StoreError> {
        Ok(self
            .snapshot()?
            .map(|s| s.calculator.balance())
            .unwrap_or(0.0))
    }

    /// Append `entry` under `guard`, creating the table if needed.
    ///
    /// The balance is read and extended inside the same hold. The row is
    /// written in the table's own layout. Returns the new balance.
    pub fn append(&self, guard: &TableGuard, entry: &LedgerEntry) -> Result<f64, StoreError> {
        let current = SchemaVersion::Current.tag_line();
        self.table.ensure(guard, Some(&current), &CURRENT_COLUMNS)?;

        let Snapshot { layout, calculator } = match self.snapshot()? {
            Some(snapshot) => snapshot,
            None => Snapshot {
                layout: LedgerLayout::current(),
                calculator: LedgerLayout::current().balance_calculator(),
            },
        };
        let new_balance = round3(entry.extend(calculator.raw()));
        self.table.append(guard, layout.encode(entry, new_balance))?;
        Ok(new_balance)
    }

    /// Whether an OUT row referencing `reference` exists.
    pub fn has_withdrawal_for(&self, reference: &str) -> Result<bool, StoreError> {
        let Some(reader) = self.table.read()? else {
            return Ok(false);
        };
        let layout = self.layout_of(&reader)?;
        for record in reader {
            if layout.is_withdrawal_for(&cells(&record?), reference) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
