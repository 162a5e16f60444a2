//! Infrastructure layer: CSV stores, locking, configuration and the
//! synchronous lab operations built on them.

pub mod config;
pub mod error;
pub mod journal;
pub mod ledger_store;
pub mod reconcile;
pub mod request_store;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

pub use config::{Settings, StorePaths};
pub use error::{InventoryError, InventoryResult};
pub use reconcile::{ReconcileReport, Reconciler};
pub use services::LabServices;
