use core::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use labstock_core::{required, Aggregate, AggregateRoot, DomainError, RequestId};

use crate::ledger::{LedgerEntry, TransactionType};
use crate::material::Material;
use crate::quantity::positive;

/// Format of `approval_time` cells.
pub const APPROVAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Borrow request status lifecycle: Pending → Approved | Rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    /// Exact match on the stored spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(RequestStatus::Pending),
            "Approved" => Ok(RequestStatus::Approved),
            "Rejected" => Ok(RequestStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown request status '{other}'"))),
        }
    }
}

/// Admin decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn resulting_status(self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Decision::Approve),
            "REJECT" => Ok(Decision::Reject),
            other => Err(DomainError::validation(format!(
                "action must be APPROVE or REJECT, got '{other}'"
            ))),
        }
    }
}

/// Aggregate root: BorrowRequest.
///
/// # Invariants
/// - Created Pending.
/// - Decided at most once; Approved and Rejected are terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowRequest {
    pub request_id: RequestId,
    pub material: String,
    pub quantity: f64,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub request_date: String,
    pub request_time: String,
    pub remarks: String,
    pub status: RequestStatus,
    pub approved_by: String,
    pub approval_time: String,
    pub created: bool,
}

impl BorrowRequest {
    /// Create an empty, not-yet-opened aggregate instance.
    pub fn empty(request_id: RequestId) -> Self {
        Self {
            request_id,
            material: String::new(),
            quantity: 0.0,
            unit: String::new(),
            purpose: String::new(),
            employee_name: String::new(),
            employee_id: String::new(),
            request_date: String::new(),
            request_time: String::new(),
            remarks: String::new(),
            status: RequestStatus::Pending,
            approved_by: String::new(),
            approval_time: String::new(),
            created: false,
        }
    }

    /// Requester label used as the ledger counterparty.
    pub fn requester(&self) -> String {
        if self.employee_id.is_empty() {
            self.employee_name.clone()
        } else {
            format!("{} ({})", self.employee_name, self.employee_id)
        }
    }

    /// The OUT ledger entry an approval of this request produces.
    pub fn withdrawal(&self, decided_at: NaiveDateTime) -> LedgerEntry {
        let mut remarks = format!("approved by {}", self.approved_by);
        if !self.purpose.is_empty() {
            remarks = format!("{}; {remarks}", self.purpose);
        }
        LedgerEntry {
            date: decided_at.format("%Y-%m-%d").to_string(),
            time: decided_at.format("%H:%M").to_string(),
            transaction_type: TransactionType::Out,
            material: self.material.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            counterparty: self.requester(),
            reference: self.request_id.to_string(),
            received_by: self.employee_name.clone(),
            remarks,
        }
    }
}

impl AggregateRoot for BorrowRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.request_id
    }
}

/// Command: OpenRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub request_id: RequestId,
    pub material: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub request_date: String,
    pub request_time: String,
    pub remarks: String,
}

/// Command: DecideRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideRequest {
    pub request_id: RequestId,
    pub decision: Decision,
    pub approver: String,
    pub decided_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestCommand {
    Open(OpenRequest),
    Decide(DecideRequest),
}

/// Event: RequestOpened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOpened {
    pub request_id: RequestId,
    pub material: String,
    pub quantity: f64,
    pub unit: String,
    pub purpose: String,
    pub employee_name: String,
    pub employee_id: String,
    pub request_date: String,
    pub request_time: String,
    pub remarks: String,
}

/// Event: RequestDecided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDecided {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub approved_by: String,
    pub approval_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestEvent {
    Opened(RequestOpened),
    Decided(RequestDecided),
}

impl Aggregate for BorrowRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::Opened(e) => {
                self.request_id = e.request_id.clone();
                self.material = e.material.clone();
                self.quantity = e.quantity;
                self.unit = e.unit.clone();
                self.purpose = e.purpose.clone();
                self.employee_name = e.employee_name.clone();
                self.employee_id = e.employee_id.clone();
                self.request_date = e.request_date.clone();
                self.request_time = e.request_time.clone();
                self.remarks = e.remarks.clone();
                self.status = RequestStatus::Pending;
                self.created = true;
            }
            RequestEvent::Decided(e) => {
                self.status = e.status;
                self.approved_by = e.approved_by.clone();
                self.approval_time = e.approval_time.clone();
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::Open(cmd) => self.handle_open(cmd),
            RequestCommand::Decide(cmd) => self.handle_decide(cmd),
        }
    }
}

impl BorrowRequest {
    fn ensure_request_id(&self, request_id: &RequestId) -> Result<(), DomainError> {
        if &self.request_id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "request {} already exists",
                self.request_id
            )));
        }
        self.ensure_request_id(&cmd.request_id)?;

        let material = Material::parse(&cmd.material)?;
        let quantity = positive("quantity", cmd.quantity)?;
        let employee_name = required("employee_name", &cmd.employee_name)?;

        Ok(vec![RequestEvent::Opened(RequestOpened {
            request_id: cmd.request_id.clone(),
            material: material.name().to_string(),
            quantity,
            unit: cmd.unit.trim().to_string(),
            purpose: cmd.purpose.trim().to_string(),
            employee_name: employee_name.to_string(),
            employee_id: cmd.employee_id.trim().to_string(),
            request_date: cmd.request_date.trim().to_string(),
            request_time: cmd.request_time.trim().to_string(),
            remarks: cmd.remarks.trim().to_string(),
        })])
    }

    fn handle_decide(&self, cmd: &DecideRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("request {}", cmd.request_id)));
        }
        self.ensure_request_id(&cmd.request_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "request {} is already {}",
                self.request_id, self.status
            )));
        }
        let approver = required("approved_by", &cmd.approver)?;

        Ok(vec![RequestEvent::Decided(RequestDecided {
            request_id: cmd.request_id.clone(),
            status: cmd.decision.resulting_status(),
            approved_by: approver.to_string(),
            approval_time: cmd.decided_at.format(APPROVAL_TIME_FORMAT).to_string(),
        })])
    }
}
