//! The borrow request table.
//!
//! Requests are appended as Pending rows and updated in place when decided.
//! Columns are located by header name, so tables written with a different
//! column order still load.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use csv::StringRecord;

use labstock_core::{DomainError, RequestId};
use labstock_inventory::quantity::{format_quantity, parse_cell};
use labstock_inventory::BorrowRequest;

use crate::store::{CsvTable, StoreError, TableGuard, TableLocks, TableReader};

pub const REQUEST_COLUMNS: [&str; 13] = [
    "request_id",
    "material",
    "quantity",
    "unit",
    "purpose",
    "employee_name",
    "employee_id",
    "date",
    "time",
    "remarks",
    "status",
    "approved_by",
    "approval_time",
];

/// Header position of each known column.
#[derive(Debug, Clone)]
struct Columns {
    width: usize,
    positions: HashMap<&'static str, usize>,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Self {
        let mut positions = HashMap::new();
        for (idx, name) in header.iter().enumerate() {
            let name = name.trim();
            if let Some(known) = REQUEST_COLUMNS.iter().find(|c| **c == name) {
                positions.entry(*known).or_insert(idx);
            }
        }
        Self {
            width: header.len(),
            positions,
        }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|idx| record.get(*idx))
            .map(str::trim)
            .unwrap_or("")
    }

    /// `None` for rows without a request id.
    fn decode(&self, record: &StringRecord) -> Option<Result<BorrowRequest, DomainError>> {
        let raw_id = self.get(record, "request_id");
        if raw_id.is_empty() {
            return None;
        }
        Some(self.decode_with_id(raw_id, record))
    }

    fn decode_with_id(&self, raw_id: &str, record: &StringRecord) -> Result<BorrowRequest, DomainError> {
        let mut request = BorrowRequest::empty(raw_id.parse()?);
        request.material = self.get(record, "material").to_string();
        request.quantity = parse_cell(self.get(record, "quantity")).unwrap_or(0.0);
        request.unit = self.get(record, "unit").to_string();
        request.purpose = self.get(record, "purpose").to_string();
        request.employee_name = self.get(record, "employee_name").to_string();
        request.employee_id = self.get(record, "employee_id").to_string();
        request.request_date = self.get(record, "date").to_string();
        request.request_time = self.get(record, "time").to_string();
        request.remarks = self.get(record, "remarks").to_string();
        request.status = self.get(record, "status").parse()?;
        request.approved_by = self.get(record, "approved_by").to_string();
        request.approval_time = self.get(record, "approval_time").to_string();
        request.created = true;
        Ok(request)
    }

    fn encode(&self, request: &BorrowRequest) -> Vec<String> {
        let mut row = vec![String::new(); self.width];
        let values = [
            ("request_id", request.request_id.to_string()),
            ("material", request.material.clone()),
            ("quantity", format_quantity(request.quantity)),
            ("unit", request.unit.clone()),
            ("purpose", request.purpose.clone()),
            ("employee_name", request.employee_name.clone()),
            ("employee_id", request.employee_id.clone()),
            ("date", request.request_date.clone()),
            ("time", request.request_time.clone()),
            ("remarks", request.remarks.clone()),
            ("status", request.status.to_string()),
            ("approved_by", request.approved_by.clone()),
            ("approval_time", request.approval_time.clone()),
        ];
        for (column, value) in values {
            if let Some(idx) = self.positions.get(column) {
                row[*idx] = value;
            }
        }
        row
    }

    fn require(&self, table: &str, column: &str) -> Result<usize, StoreError> {
        self.positions
            .get(column)
            .copied()
            .ok_or_else(|| StoreError::format(table, format!("request table has no '{column}' column")))
    }
}

#[derive(Debug, Clone)]
pub struct RequestStore {
    table: CsvTable,
}

impl RequestStore {
    pub fn new(path: impl Into<PathBuf>, locks: Arc<TableLocks>) -> Self {
        Self {
            table: CsvTable::new(path, locks),
        }
    }

    pub fn lock(&self) -> Result<TableGuard, StoreError> {
        self.table.lock()
    }

    /// Lazily decode every request in insertion order.
    pub fn requests(&self) -> Result<Requests, StoreError> {
        let reader = self.table.read()?;
        let columns = reader.as_ref().map(|r| Columns::from_header(r.header()));
        Ok(Requests { reader, columns })
    }

    /// Read the whole table, indexing rows by request id (first wins).
    pub fn load(&self) -> Result<RequestSnapshot, StoreError> {
        let Some(reader) = self.table.read()? else {
            return Ok(RequestSnapshot::empty());
        };
        let header = reader.header().clone();
        let tag = reader.tag().map(str::to_string);
        let columns = Columns::from_header(&header);

        let mut records = Vec::new();
        let mut index = HashMap::new();
        for record in reader {
            let record = record?;
            let id = columns.get(&record, "request_id");
            if !id.is_empty() {
                index.entry(id.to_string()).or_insert(records.len());
            }
            records.push(record);
        }
        Ok(RequestSnapshot {
            tag,
            header,
            columns,
            records,
            index,
        })
    }

    /// Append a new request row, creating the table if needed.
    pub fn append(&self, guard: &TableGuard, request: &BorrowRequest) -> Result<(), StoreError> {
        self.table.ensure(guard, None, &REQUEST_COLUMNS)?;
        let header = match self.table.read()? {
            Some(reader) => reader.header().clone(),
            None => StringRecord::from(REQUEST_COLUMNS.to_vec()),
        };
        let columns = Columns::from_header(&header);
        columns.require(&self.table.name(), "request_id")?;
        self.table.append(guard, columns.encode(request))
    }

    /// Write a decided request back into its row.
    pub fn save_decision(
        &self,
        guard: &TableGuard,
        mut snapshot: RequestSnapshot,
        position: usize,
        request: &BorrowRequest,
    ) -> Result<(), StoreError> {
        let name = self.table.name();
        let updates = [
            (snapshot.columns.require(&name, "status")?, request.status.to_string()),
            (snapshot.columns.require(&name, "approved_by")?, request.approved_by.clone()),
            (snapshot.columns.require(&name, "approval_time")?, request.approval_time.clone()),
        ];

        let Some(record) = snapshot.records.get(position) else {
            return Err(StoreError::format(name, format!("row {position} is out of range")));
        };
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.len() < snapshot.columns.width {
            cells.resize(snapshot.columns.width, String::new());
        }
        for (idx, value) in updates {
            cells[idx] = value;
        }
        snapshot.records[position] = StringRecord::from(cells);

        self.table
            .rewrite(guard, snapshot.tag.as_deref(), &snapshot.header, &snapshot.records)
    }
}

/// Whole-table view used for lookups and in-place updates.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    tag: Option<String>,
    header: StringRecord,
    columns: Columns,
    records: Vec<StringRecord>,
    index: HashMap<String, usize>,
}

impl RequestSnapshot {
    fn empty() -> Self {
        let header = StringRecord::from(REQUEST_COLUMNS.to_vec());
        Self {
            tag: None,
            columns: Columns::from_header(&header),
            header,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.index.contains_key(id.as_str())
    }

    /// Row position and decoded request for `id`, if present.
    pub fn find(&self, id: &RequestId) -> Option<(usize, Result<BorrowRequest, DomainError>)> {
        let position = *self.index.get(id.as_str())?;
        let record = &self.records[position];
        Some((position, self.columns.decode_with_id(id.as_str(), record)))
    }
}

/// Lazy sequence of decoded requests. Rows without an id or with an
/// unreadable status are skipped.
pub struct Requests {
    reader: Option<TableReader>,
    columns: Option<Columns>,
}

impl Iterator for Requests {
    type Item = Result<BorrowRequest, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let columns = self.columns.as_ref()?;
        loop {
            let record = match reader.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err)),
            };
            match columns.decode(&record) {
                None => tracing::debug!("skipping request row without request_id"),
                Some(Ok(request)) => return Some(Ok(request)),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "skipping unreadable request row")
                }
            }
        }
    }
}
