//! CSV-backed table storage with per-table locking.

pub mod error;
pub mod lock;
pub mod table;

pub use error::StoreError;
pub use lock::{TableGuard, TableLocks};
pub use table::{cells, CsvTable, TableReader};
