//! Tanker movements: arrivals and dispatches.
//!
//! A movement is written once to its type log (arrivals or dispatches) and
//! once to the shared history log. Rows in both logs are matched by
//! [`MovementKey`].

use core::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use labstock_core::{required, DomainError, DomainResult};

use crate::quantity::{format_quantity, non_negative};

/// Microsecond precision keeps keys unique for movements of one tanker.
pub const RECORDED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub const ARRIVAL_COLUMNS: [&str; 13] = [
    "tanker_id",
    "raw_material",
    "quantity",
    "supplier",
    "driver_name",
    "arrival_date",
    "arrival_time",
    "sampling_date",
    "sampling_time",
    "batch_number",
    "order_number",
    "recorded_by",
    "recorded_at",
];

pub const DISPATCH_COLUMNS: [&str; 12] = [
    "tanker_id",
    "finished_product",
    "quantity",
    "destination",
    "customer_name",
    "driver_name",
    "dispatch_date",
    "dispatch_time",
    "batch_number",
    "order_number",
    "recorded_by",
    "recorded_at",
];

pub const HISTORY_COLUMNS: [&str; 11] = [
    "tanker_id",
    "movement_type",
    "material_or_product",
    "quantity",
    "date",
    "time",
    "batch",
    "order",
    "source_or_destination",
    "recorded_by",
    "recorded_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    Arrival,
    Dispatch,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Arrival => "ARRIVAL",
            MovementType::Dispatch => "DISPATCH",
        }
    }

    /// Header of this movement type's log.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            MovementType::Arrival => &ARRIVAL_COLUMNS,
            MovementType::Dispatch => &DISPATCH_COLUMNS,
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ARRIVAL" => Ok(MovementType::Arrival),
            "DISPATCH" => Ok(MovementType::Dispatch),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// Fields only the type log carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "movement_type", rename_all = "UPPERCASE")]
pub enum MovementDetails {
    Arrival {
        driver_name: String,
        sampling_date: String,
        sampling_time: String,
    },
    Dispatch {
        driver_name: String,
        customer_name: String,
    },
}

impl MovementDetails {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementDetails::Arrival { .. } => MovementType::Arrival,
            MovementDetails::Dispatch { .. } => MovementType::Dispatch,
        }
    }
}

/// Identity shared by a type-log row and its history row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MovementKey {
    pub tanker_id: String,
    pub movement_type: MovementType,
    pub recorded_at: String,
}

impl MovementKey {
    /// Key of a raw type-log row; `None` for rows too short to carry one.
    pub fn from_type_log_row<S: AsRef<str>>(movement_type: MovementType, row: &[S]) -> Option<Self> {
        let width = movement_type.columns().len();
        if row.len() < width {
            return None;
        }
        let tanker_id = row[0].as_ref().trim();
        if tanker_id.is_empty() {
            return None;
        }
        Some(Self {
            tanker_id: tanker_id.to_string(),
            movement_type,
            recorded_at: row[width - 1].as_ref().trim().to_string(),
        })
    }
}

impl core::fmt::Display for MovementKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}@{}", self.movement_type, self.tanker_id, self.recorded_at)
    }
}

/// A movement as submitted, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementDraft {
    pub tanker_id: String,
    pub material_or_product: String,
    pub quantity: Option<f64>,
    pub date: String,
    pub time: String,
    pub batch: String,
    pub order: String,
    pub counterpart: String,
    pub recorded_by: String,
    pub recorded_at: NaiveDateTime,
    pub details: MovementDetails,
}

impl MovementDraft {
    pub fn validate(self) -> DomainResult<Movement> {
        let tanker_id = required("tanker_id", &self.tanker_id)?.to_string();
        let material_or_product = required("material_or_product", &self.material_or_product)?
            .to_string();
        let quantity = non_negative("quantity", self.quantity)?;

        Ok(Movement {
            tanker_id,
            material_or_product,
            quantity,
            date: self.date.trim().to_string(),
            time: self.time.trim().to_string(),
            batch: self.batch.trim().to_string(),
            order: self.order.trim().to_string(),
            counterpart: self.counterpart.trim().to_string(),
            recorded_by: self.recorded_by.trim().to_string(),
            recorded_at: self.recorded_at.format(RECORDED_AT_FORMAT).to_string(),
            details: self.details,
        })
    }
}

/// A validated tanker movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub tanker_id: String,
    pub material_or_product: String,
    pub quantity: f64,
    pub date: String,
    pub time: String,
    pub batch: String,
    pub order: String,
    pub counterpart: String,
    pub recorded_by: String,
    pub recorded_at: String,
    pub details: MovementDetails,
}

impl Movement {
    pub fn movement_type(&self) -> MovementType {
        self.details.movement_type()
    }

    pub fn key(&self) -> MovementKey {
        MovementKey {
            tanker_id: self.tanker_id.clone(),
            movement_type: self.movement_type(),
            recorded_at: self.recorded_at.clone(),
        }
    }

    /// Row for the arrivals or dispatches log, in that log's column order.
    pub fn type_log_row(&self) -> Vec<String> {
        let quantity = format_quantity(self.quantity);
        match &self.details {
            MovementDetails::Arrival {
                driver_name,
                sampling_date,
                sampling_time,
            } => vec![
                self.tanker_id.clone(),
                self.material_or_product.clone(),
                quantity,
                self.counterpart.clone(),
                driver_name.clone(),
                self.date.clone(),
                self.time.clone(),
                sampling_date.clone(),
                sampling_time.clone(),
                self.batch.clone(),
                self.order.clone(),
                self.recorded_by.clone(),
                self.recorded_at.clone(),
            ],
            MovementDetails::Dispatch {
                driver_name,
                customer_name,
            } => vec![
                self.tanker_id.clone(),
                self.material_or_product.clone(),
                quantity,
                self.counterpart.clone(),
                customer_name.clone(),
                driver_name.clone(),
                self.date.clone(),
                self.time.clone(),
                self.batch.clone(),
                self.order.clone(),
                self.recorded_by.clone(),
                self.recorded_at.clone(),
            ],
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            tanker_id: self.tanker_id.clone(),
            movement_type: self.movement_type(),
            material_or_product: self.material_or_product.clone(),
            quantity: format_quantity(self.quantity),
            date: self.date.clone(),
            time: self.time.clone(),
            batch: self.batch.clone(),
            order: self.order.clone(),
            source_or_destination: self.counterpart.clone(),
            recorded_by: self.recorded_by.clone(),
            recorded_at: self.recorded_at.clone(),
        }
    }
}

/// One row of the unified history log. Quantities keep their stored text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tanker_id: String,
    pub movement_type: MovementType,
    pub material_or_product: String,
    pub quantity: String,
    pub date: String,
    pub time: String,
    pub batch: String,
    pub order: String,
    pub source_or_destination: String,
    pub recorded_by: String,
    pub recorded_at: String,
}

impl HistoryEntry {
    pub fn key(&self) -> MovementKey {
        MovementKey {
            tanker_id: self.tanker_id.clone(),
            movement_type: self.movement_type,
            recorded_at: self.recorded_at.clone(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.tanker_id.clone(),
            self.movement_type.as_str().to_string(),
            self.material_or_product.clone(),
            self.quantity.clone(),
            self.date.clone(),
            self.time.clone(),
            self.batch.clone(),
            self.order.clone(),
            self.source_or_destination.clone(),
            self.recorded_by.clone(),
            self.recorded_at.clone(),
        ]
    }

    /// Decode a raw history row. Short rows or unknown movement types fail.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> DomainResult<Self> {
        if row.len() < HISTORY_COLUMNS.len() {
            return Err(DomainError::validation(format!(
                "history row has {} cells, expected {}",
                row.len(),
                HISTORY_COLUMNS.len()
            )));
        }
        let cell = |i: usize| row[i].as_ref().trim().to_string();
        Ok(Self {
            tanker_id: cell(0),
            movement_type: row[1].as_ref().parse()?,
            material_or_product: cell(2),
            quantity: cell(3),
            date: cell(4),
            time: cell(5),
            batch: cell(6),
            order: cell(7),
            source_or_destination: cell(8),
            recorded_by: cell(9),
            recorded_at: cell(10),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn recorded_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(8, 30, 0, 42)
            .unwrap()
    }

    fn arrival_draft() -> MovementDraft {
        MovementDraft {
            tanker_id: "TK-101".to_string(),
            material_or_product: "Caustic Soda".to_string(),
            quantity: Some(24.5),
            date: "2024-05-01".to_string(),
            time: "08:15".to_string(),
            batch: "B-7".to_string(),
            order: "PO-88".to_string(),
            counterpart: "Acme Chemicals".to_string(),
            recorded_by: "gate".to_string(),
            recorded_at: recorded_at(),
            details: MovementDetails::Arrival {
                driver_name: "Ravi".to_string(),
                sampling_date: "2024-05-01".to_string(),
                sampling_time: "08:40".to_string(),
            },
        }
    }

    #[test]
    fn validation_rejects_missing_identity_and_bad_quantity() {
        let mut draft = arrival_draft();
        draft.tanker_id = " ".to_string();
        assert!(draft.validate().is_err());

        let mut draft = arrival_draft();
        draft.material_or_product = String::new();
        assert!(draft.validate().is_err());

        let mut draft = arrival_draft();
        draft.quantity = Some(f64::NAN);
        assert!(draft.validate().is_err());

        let mut draft = arrival_draft();
        draft.quantity = Some(0.0);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn arrival_rows_share_key_with_history_entry() {
        let movement = arrival_draft().validate().unwrap();
        assert_eq!(movement.recorded_at, "2024-05-01 08:30:00.000042");

        let row = movement.type_log_row();
        assert_eq!(row.len(), ARRIVAL_COLUMNS.len());
        assert_eq!(row[3], "Acme Chemicals");
        assert_eq!(row[7], "2024-05-01");

        let key = MovementKey::from_type_log_row(MovementType::Arrival, &row).unwrap();
        let history = movement.history_entry();
        assert_eq!(key, history.key());
        assert_eq!(history.quantity, row[2]);
        assert_eq!(history.date, row[5]);
        assert_eq!(history.time, row[6]);
    }

    #[test]
    fn dispatch_row_follows_dispatch_columns() {
        let mut draft = arrival_draft();
        draft.material_or_product = "Sodium Silicate".to_string();
        draft.counterpart = "Port Depot".to_string();
        draft.details = MovementDetails::Dispatch {
            driver_name: "Ravi".to_string(),
            customer_name: "Blue Mills".to_string(),
        };
        let movement = draft.validate().unwrap();
        assert_eq!(movement.movement_type(), MovementType::Dispatch);

        let row = movement.type_log_row();
        assert_eq!(row.len(), DISPATCH_COLUMNS.len());
        assert_eq!(row[3], "Port Depot");
        assert_eq!(row[4], "Blue Mills");
        assert_eq!(row[5], "Ravi");
        assert_eq!(row[11], movement.recorded_at);
    }

    #[test]
    fn history_row_decodes_back() {
        let entry = arrival_draft().validate().unwrap().history_entry();
        let decoded = HistoryEntry::from_row(&entry.to_row()).unwrap();
        assert_eq!(decoded, entry);

        assert!(HistoryEntry::from_row(&["TK-1", "ARRIVAL"]).is_err());
    }

    #[test]
    fn short_type_rows_have_no_key() {
        assert!(MovementKey::from_type_log_row(MovementType::Arrival, &["TK-1", "x"]).is_none());
    }
}
