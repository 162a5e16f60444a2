use axum::http::StatusCode;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use labstock_infra::services::{MaterialBalance, NewRequest, StockReceipt};
use labstock_inventory::{BorrowRequest, HistoryEntry, MovementDetails, MovementDraft};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Quantities arrive as JSON numbers or as the text of a form field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Number(f64),
    Text(String),
}

/// `Ok(None)` for a missing or blank quantity; the services report it as required.
pub fn parse_quantity(input: Option<&QuantityInput>) -> Result<Option<f64>, axum::response::Response> {
    match input {
        None => Ok(None),
        Some(QuantityInput::Number(n)) => Ok(Some(*n)),
        Some(QuantityInput::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(QuantityInput::Text(text)) => text.trim().parse::<f64>().map(Some).map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("quantity must be a number, got '{}'", text.trim()),
            )
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddStockRequest {
    pub material: String,
    pub quantity: Option<QuantityInput>,
    pub unit: String,
    pub supplier: String,
    pub invoice_no: String,
    pub date: String,
    pub time: String,
    pub remarks: String,
    pub received_by: String,
}

impl AddStockRequest {
    pub fn into_receipt(self) -> Result<StockReceipt, axum::response::Response> {
        Ok(StockReceipt {
            quantity: parse_quantity(self.quantity.as_ref())?,
            material: self.material,
            unit: self.unit,
            supplier: self.supplier,
            invoice_no: self.invoice_no,
            date: self.date,
            time: self.time,
            remarks: self.remarks,
            received_by: self.received_by,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BorrowRequestBody {
    #[serde(alias = "material")]
    pub raw_material: String,
    pub quantity: Option<QuantityInput>,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub request_date: String,
    pub request_time: String,
    pub remarks: String,
}

impl BorrowRequestBody {
    pub fn into_new_request(self) -> Result<NewRequest, axum::response::Response> {
        Ok(NewRequest {
            quantity: parse_quantity(self.quantity.as_ref())?,
            material: self.raw_material,
            unit: self.unit,
            purpose: self.purpose,
            employee_name: self.employee_name,
            employee_id: self.employee_id,
            request_date: self.request_date,
            request_time: self.request_time,
            remarks: self.remarks,
        })
    }
}

fn default_approver() -> String {
    "Admin".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default = "default_approver")]
    pub approved_by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArrivalRequest {
    #[serde(alias = "tanker_id")]
    pub tanker_number: String,
    pub raw_material: String,
    pub quantity: Option<QuantityInput>,
    pub supplier: String,
    pub driver_name: String,
    pub arrival_date: String,
    pub arrival_time: String,
    pub sampling_date: String,
    pub sampling_time: String,
    pub batch_number: String,
    pub order_number: String,
    pub recorded_by: String,
}

impl ArrivalRequest {
    pub fn into_draft(self, recorded_at: NaiveDateTime) -> Result<MovementDraft, axum::response::Response> {
        Ok(MovementDraft {
            quantity: parse_quantity(self.quantity.as_ref())?,
            tanker_id: self.tanker_number,
            material_or_product: self.raw_material,
            date: self.arrival_date,
            time: self.arrival_time,
            batch: self.batch_number,
            order: self.order_number,
            counterpart: self.supplier,
            recorded_by: self.recorded_by,
            recorded_at,
            details: MovementDetails::Arrival {
                driver_name: self.driver_name,
                sampling_date: self.sampling_date,
                sampling_time: self.sampling_time,
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DispatchRequest {
    #[serde(alias = "tanker_id")]
    pub tanker_number: String,
    pub finished_product: String,
    pub quantity: Option<QuantityInput>,
    pub destination: String,
    pub customer_name: String,
    pub driver_name: String,
    pub dispatch_date: String,
    pub dispatch_time: String,
    pub batch_number: String,
    pub order_number: String,
    pub recorded_by: String,
}

impl DispatchRequest {
    pub fn into_draft(self, recorded_at: NaiveDateTime) -> Result<MovementDraft, axum::response::Response> {
        Ok(MovementDraft {
            quantity: parse_quantity(self.quantity.as_ref())?,
            tanker_id: self.tanker_number,
            material_or_product: self.finished_product,
            date: self.dispatch_date,
            time: self.dispatch_time,
            batch: self.batch_number,
            order: self.order_number,
            counterpart: self.destination,
            recorded_by: self.recorded_by,
            recorded_at,
            details: MovementDetails::Dispatch {
                driver_name: self.driver_name,
                customer_name: self.customer_name,
            },
        })
    }
}

pub fn recorded_now() -> NaiveDateTime {
    Local::now().naive_local()
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub material: String,
    pub balance: f64,
}

impl From<MaterialBalance> for BalanceView {
    fn from(value: MaterialBalance) -> Self {
        Self {
            material: value.material,
            balance: value.balance,
        }
    }
}

/// Request row as the admin panel reads it.
#[derive(Debug, Serialize)]
pub struct RequestView {
    pub request_id: String,
    pub raw_material: String,
    pub quantity: f64,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub date: String,
    pub time: String,
    pub remarks: String,
    pub status: String,
    pub approved_by: String,
    pub approval_time: String,
}

impl From<BorrowRequest> for RequestView {
    fn from(r: BorrowRequest) -> Self {
        Self {
            request_id: r.request_id.to_string(),
            raw_material: r.material,
            quantity: r.quantity,
            unit: r.unit,
            purpose: r.purpose,
            employee_name: r.employee_name,
            employee_id: r.employee_id,
            date: r.request_date,
            time: r.request_time,
            remarks: r.remarks,
            status: r.status.as_str().to_string(),
            approved_by: r.approved_by,
            approval_time: r.approval_time,
        }
    }
}

/// History row with the field names the tanker pages use.
#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub tanker_number: String,
    pub movement_type: String,
    pub material_or_product: String,
    pub quantity: String,
    pub date: String,
    pub time: String,
    pub batch_number: String,
    pub order_number: String,
    pub source_or_destination: String,
    pub recorded_by: String,
    pub recorded_at: String,
}

impl From<HistoryEntry> for HistoryView {
    fn from(h: HistoryEntry) -> Self {
        Self {
            tanker_number: h.tanker_id,
            movement_type: h.movement_type.to_string(),
            material_or_product: h.material_or_product,
            quantity: h.quantity,
            date: h.date,
            time: h.time,
            batch_number: h.batch,
            order_number: h.order,
            source_or_destination: h.source_or_destination,
            recorded_by: h.recorded_by,
            recorded_at: h.recorded_at,
        }
    }
}
