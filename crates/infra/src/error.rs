//! Operation-boundary error taxonomy.

use thiserror::Error;

use labstock_core::{DomainError, IntentId};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Missing or invalid input. Nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced material, request or store is absent. Nothing was written.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request has already reached a terminal state.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store locked: {0}")]
    StoreLocked(String),

    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// The second of two required writes failed after the first succeeded.
    /// The journal keeps the intent open until the reconciler repairs it.
    #[error("partial write (intent {intent_id}): {completed} succeeded, {failed} failed: {source}")]
    PartialWrite {
        intent_id: IntentId,
        completed: &'static str,
        failed: &'static str,
        #[source]
        source: Box<InventoryError>,
    },

    #[error("store error: {0}")]
    Store(String),
}

impl InventoryError {
    /// Stable code for transport responses.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "validation_error",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::Conflict(_) => "conflict",
            InventoryError::StoreLocked(_) => "store_locked",
            InventoryError::LockTimeout(_) => "lock_timeout",
            InventoryError::PartialWrite { .. } => "partial_write",
            InventoryError::Store(_) => "store_error",
        }
    }

    /// Contention errors; the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::StoreLocked(_) | InventoryError::LockTimeout(_))
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => InventoryError::Validation(msg),
            DomainError::NotFound(msg) => InventoryError::NotFound(msg),
            DomainError::Conflict(msg) => InventoryError::Conflict(msg),
            DomainError::InvariantViolation(msg) => InventoryError::Store(msg),
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(path) => InventoryError::NotFound(format!("store {}", path.display())),
            StoreError::Locked { .. } => InventoryError::StoreLocked(value.to_string()),
            StoreError::LockTimeout { .. } => InventoryError::LockTimeout(value.to_string()),
            other => InventoryError::Store(other.to_string()),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_is_retryable() {
        let locked: InventoryError = StoreError::Locked { table: "history".into() }.into();
        let timeout: InventoryError = StoreError::LockTimeout {
            table: "history".into(),
            waited_ms: 50,
        }
        .into();
        assert!(locked.is_retryable());
        assert!(timeout.is_retryable());
        assert_eq!(locked.code(), "store_locked");
        assert_eq!(timeout.code(), "lock_timeout");
        assert!(!InventoryError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        let err: InventoryError = DomainError::conflict("request A is already Approved").into();
        assert_eq!(err.code(), "conflict");
        let err: InventoryError = DomainError::validation("material is required").into();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn partial_write_names_both_steps() {
        let err = InventoryError::PartialWrite {
            intent_id: IntentId::new(),
            completed: "arrival log",
            failed: "history log",
            source: Box::new(InventoryError::StoreLocked("history".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("arrival log succeeded"));
        assert!(msg.contains("history log failed"));
        assert_eq!(err.code(), "partial_write");
    }
}
