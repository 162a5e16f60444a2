//! Ledger rows, table layouts and the balance calculator.
//!
//! A material's ledger is a flat table. Two layouts exist in the wild:
//!
//! - **current**: one `quantity` column plus `transaction_type` and an
//!   explicit running `balance` column;
//! - **legacy**: separate inward/outward quantity columns and no balance.
//!
//! A table's layout is resolved once per read into a [`LedgerLayout`]. All
//! reads and writes go through that value, so callers never look at header
//! cells themselves.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult};

use crate::quantity::{format_quantity, parse_cell, round3};

/// Column names of the current ledger layout, in write order.
pub const CURRENT_COLUMNS: [&str; 11] = [
    "date",
    "time",
    "transaction_type",
    "material",
    "quantity",
    "unit",
    "counterparty",
    "reference",
    "received_by",
    "remarks",
    "balance",
];

/// Column names of the legacy ledger layout, in write order.
pub const LEGACY_COLUMNS: [&str; 9] = [
    "date",
    "time",
    "material",
    "inward_qty",
    "outward_qty",
    "unit",
    "party",
    "reference",
    "remarks",
];

/// Prefix of the schema tag line written as the first line of new tables.
pub const SCHEMA_TAG_PREFIX: &str = "#schema=";

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    In,
    Out,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
        }
    }

    /// Sign applied to the quantity when extending a running balance.
    pub fn sign(self) -> f64 {
        match self {
            TransactionType::In => 1.0,
            TransactionType::Out => -1.0,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(TransactionType::In),
            "OUT" => Ok(TransactionType::Out),
            other => Err(DomainError::validation(format!(
                "unknown transaction type '{other}'"
            ))),
        }
    }
}

/// One ledger movement, independent of the table layout it is written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: String,
    pub time: String,
    pub transaction_type: TransactionType,
    pub material: String,
    pub quantity: f64,
    pub unit: String,
    pub counterparty: String,
    pub reference: String,
    pub received_by: String,
    pub remarks: String,
}

impl LedgerEntry {
    /// Balance after this entry is applied to `previous`.
    pub fn extend(&self, previous: f64) -> f64 {
        previous + self.transaction_type.sign() * self.quantity
    }
}

/// Schema version tag of a ledger table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    Legacy,
    Current,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "legacy",
            SchemaVersion::Current => "current",
        }
    }

    /// The tag line written above the header of new tables.
    pub fn tag_line(self) -> String {
        format!("{SCHEMA_TAG_PREFIX}{}", self.as_str())
    }

    /// Parse a tag line. Returns `None` when the line is not a tag.
    pub fn from_tag_line(line: &str) -> Option<DomainResult<Self>> {
        let value = line.trim().strip_prefix(SCHEMA_TAG_PREFIX)?;
        Some(value.parse())
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            SchemaVersion::Legacy => &LEGACY_COLUMNS,
            SchemaVersion::Current => &CURRENT_COLUMNS,
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "legacy" => Ok(SchemaVersion::Legacy),
            "current" => Ok(SchemaVersion::Current),
            other => Err(DomainError::invariant(format!(
                "unknown ledger schema '{other}'"
            ))),
        }
    }
}

/// Semantic meaning of a ledger column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Time,
    TransactionType,
    Material,
    Quantity,
    Inward,
    Outward,
    Unit,
    Counterparty,
    Reference,
    ReceivedBy,
    Remarks,
    Balance,
}

fn classify_column(name: &str) -> Option<Field> {
    let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    let field = match normalized.as_str() {
        "date" => Field::Date,
        "time" => Field::Time,
        "transaction_type" | "type" => Field::TransactionType,
        "material" | "raw_material" => Field::Material,
        "quantity" | "qty" => Field::Quantity,
        "unit" => Field::Unit,
        "counterparty" | "party" | "supplier" | "issued_to" => Field::Counterparty,
        "reference" | "ref" | "invoice_no" => Field::Reference,
        "received_by" => Field::ReceivedBy,
        "remarks" => Field::Remarks,
        "balance" | "running_balance" => Field::Balance,
        n if n.starts_with("inward") => Field::Inward,
        n if n.starts_with("outward") => Field::Outward,
        _ => return None,
    };
    Some(field)
}

fn cell<S: AsRef<str>>(row: &[S], idx: usize) -> &str {
    row.get(idx).map(AsRef::as_ref).unwrap_or("")
}

/// Resolved layout of one ledger table: schema version plus the meaning of
/// each header position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLayout {
    version: SchemaVersion,
    fields: Vec<Option<Field>>,
}

impl LedgerLayout {
    /// The layout new tables are created with.
    pub fn current() -> Self {
        Self {
            version: SchemaVersion::Current,
            fields: CURRENT_COLUMNS.iter().map(|c| classify_column(c)).collect(),
        }
    }

    /// Resolve a table's layout.
    ///
    /// `tag` is the schema tag line if the table carries one. Untagged tables
    /// predate tagging; their version is derived from the header signature.
    pub fn resolve<S: AsRef<str>>(tag: Option<SchemaVersion>, header: &[S]) -> DomainResult<Self> {
        let fields: Vec<Option<Field>> = header.iter().map(|h| classify_column(h.as_ref())).collect();
        let has = |f: Field| fields.contains(&Some(f));

        let version = match tag {
            Some(v) => v,
            None if has(Field::Balance) => SchemaVersion::Current,
            None if has(Field::Inward) && has(Field::Outward) => SchemaVersion::Legacy,
            None => {
                return Err(DomainError::invariant(
                    "unrecognised ledger header: expected a balance column or inward/outward columns",
                ));
            }
        };

        let required: &[(Field, &str)] = match version {
            SchemaVersion::Current => &[
                (Field::Balance, "balance"),
                (Field::Quantity, "quantity"),
                (Field::TransactionType, "transaction_type"),
            ],
            SchemaVersion::Legacy => &[(Field::Inward, "inward_qty"), (Field::Outward, "outward_qty")],
        };
        for (field, name) in required {
            if !has(*field) {
                return Err(DomainError::invariant(format!(
                    "{} ledger header is missing column '{name}'",
                    version.as_str()
                )));
            }
        }

        Ok(Self { version, fields })
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    fn position(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == Some(field))
    }

    /// Start a balance computation over this table's rows.
    pub fn balance_calculator(&self) -> BalanceCalculator {
        match self.version {
            SchemaVersion::Current => BalanceCalculator::LastValue {
                column: self.position(Field::Balance).unwrap_or(usize::MAX),
                last: None,
                ignored: 0,
            },
            SchemaVersion::Legacy => BalanceCalculator::Summation {
                inward: self.position(Field::Inward).unwrap_or(usize::MAX),
                outward: self.position(Field::Outward).unwrap_or(usize::MAX),
                sum: 0.0,
                ignored: 0,
            },
        }
    }

    /// Encode an entry into a row matching this table's header.
    ///
    /// Columns the layout does not know are left blank. Legacy tables have no
    /// receiver column, so the receiver is folded into the remarks.
    pub fn encode(&self, entry: &LedgerEntry, balance_after: f64) -> Vec<String> {
        let has_receiver = self.position(Field::ReceivedBy).is_some();
        self.fields
            .iter()
            .map(|field| match field {
                Some(Field::Date) => entry.date.clone(),
                Some(Field::Time) => entry.time.clone(),
                Some(Field::TransactionType) => entry.transaction_type.as_str().to_string(),
                Some(Field::Material) => entry.material.clone(),
                Some(Field::Quantity) => format_quantity(entry.quantity),
                Some(Field::Inward) if entry.transaction_type == TransactionType::In => {
                    format_quantity(entry.quantity)
                }
                Some(Field::Outward) if entry.transaction_type == TransactionType::Out => {
                    format_quantity(entry.quantity)
                }
                Some(Field::Inward) | Some(Field::Outward) => String::new(),
                Some(Field::Unit) => entry.unit.clone(),
                Some(Field::Counterparty) => entry.counterparty.clone(),
                Some(Field::Reference) => entry.reference.clone(),
                Some(Field::ReceivedBy) => entry.received_by.clone(),
                Some(Field::Remarks) if !has_receiver && !entry.received_by.is_empty() => {
                    if entry.remarks.is_empty() {
                        format!("received by {}", entry.received_by)
                    } else {
                        format!("{} (received by {})", entry.remarks, entry.received_by)
                    }
                }
                Some(Field::Remarks) => entry.remarks.clone(),
                Some(Field::Balance) => format_quantity(round3(balance_after)),
                None => String::new(),
            })
            .collect()
    }

    /// The material cell of `row`, if this layout has a material column.
    pub fn material<'r, S: AsRef<str>>(&self, row: &'r [S]) -> Option<&'r str> {
        let idx = self.position(Field::Material)?;
        Some(cell(row, idx).trim()).filter(|m| !m.is_empty())
    }

    /// Whether `row` is an outward movement carrying `reference`.
    pub fn is_withdrawal_for<S: AsRef<str>>(&self, row: &[S], reference: &str) -> bool {
        let Some(ref_idx) = self.position(Field::Reference) else {
            return false;
        };
        if cell(row, ref_idx).trim() != reference {
            return false;
        }
        match self.version {
            SchemaVersion::Current => self
                .position(Field::TransactionType)
                .map(|idx| cell(row, idx).trim().eq_ignore_ascii_case("OUT"))
                .unwrap_or(false),
            SchemaVersion::Legacy => self
                .position(Field::Outward)
                .and_then(|idx| parse_cell(cell(row, idx)))
                .is_some_and(|q| q > 0.0),
        }
    }
}

/// Incremental balance computation over a ledger's rows, in row order.
///
/// Accumulation is unrounded; rounding happens in [`BalanceCalculator::balance`].
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceCalculator {
    /// Current layout: the last non-null balance cell wins. Earlier rows are
    /// not checked for arithmetic consistency.
    LastValue {
        column: usize,
        last: Option<f64>,
        ignored: usize,
    },
    /// Legacy layout: running sum of inward minus outward from zero. Blank or
    /// non-numeric quantity cells count as zero.
    Summation {
        inward: usize,
        outward: usize,
        sum: f64,
        ignored: usize,
    },
}

impl BalanceCalculator {
    pub fn observe<S: AsRef<str>>(&mut self, row: &[S]) {
        match self {
            BalanceCalculator::LastValue { column, last, ignored } => {
                let raw = cell(row, *column);
                match parse_cell(raw) {
                    Some(v) => *last = Some(v),
                    None if !raw.trim().is_empty() => *ignored += 1,
                    None => {}
                }
            }
            BalanceCalculator::Summation {
                inward,
                outward,
                sum,
                ignored,
            } => {
                for (idx, sign) in [(*inward, 1.0), (*outward, -1.0)] {
                    let raw = cell(row, idx);
                    match parse_cell(raw) {
                        Some(v) => *sum += sign * v,
                        None if !raw.trim().is_empty() => *ignored += 1,
                        None => {}
                    }
                }
            }
        }
    }

    /// Unrounded balance, for further accumulation.
    pub fn raw(&self) -> f64 {
        match self {
            BalanceCalculator::LastValue { last, .. } => last.unwrap_or(0.0),
            BalanceCalculator::Summation { sum, .. } => *sum,
        }
    }

    /// Balance rounded for reporting.
    pub fn balance(&self) -> f64 {
        round3(self.raw())
    }

    /// Number of non-blank cells that could not be read as numbers.
    pub fn ignored_cells(&self) -> usize {
        match self {
            BalanceCalculator::LastValue { ignored, .. } | BalanceCalculator::Summation { ignored, .. } => {
                *ignored
            }
        }
    }
}
