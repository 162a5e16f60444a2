//! Inventory domain for the lab.
//!
//! Pure rules only (no IO, no HTTP, no storage): material identity, ledger
//! row layouts and balance calculation, the borrow request lifecycle and
//! tanker movements.

pub mod ledger;
pub mod material;
pub mod movement;
pub mod quantity;
pub mod request;

pub use ledger::{
    BalanceCalculator, LedgerEntry, LedgerLayout, SchemaVersion, TransactionType,
    CURRENT_COLUMNS, LEGACY_COLUMNS,
};
pub use material::Material;
pub use movement::{
    HistoryEntry, Movement, MovementDetails, MovementDraft, MovementKey, MovementType,
};
pub use quantity::{format_quantity, round3};
pub use request::{
    BorrowRequest, DecideRequest, Decision, OpenRequest, RequestCommand, RequestDecided,
    RequestEvent, RequestOpened, RequestStatus,
};
