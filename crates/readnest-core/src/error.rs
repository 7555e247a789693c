//! Storage error kinds shared by every [`Store`](crate::store::Store)
//! implementation and the hybrid coordinator.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::EntityKind;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record exists but belongs to another user.
    #[error("{kind} {id} is not accessible to the caller")]
    AuthorizationDenied { kind: EntityKind, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Rejected input. Never retried against another store.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("conflict: {0}")]
    Conflict(String),

    /// Connectivity, timeout or other infrastructure failure. This is the
    /// signal that sends an operation to the fallback store.
    #[error("transient store error: {0}")]
    Transient(String),

    #[error("local store file {} is corrupt: {reason}", path.display())]
    LocalStoreCorrupt { path: PathBuf, reason: String },

    #[error("storage unavailable (primary: {primary}; fallback: {fallback})")]
    StorageUnavailable { primary: String, fallback: String },

    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn denied(kind: EntityKind, id: impl Into<String>) -> Self {
        StoreError::AuthorizationDenied {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the coordinator should retry this operation on the fallback.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Errors that are a definite answer from a store that was reachable.
    pub fn is_answer(&self) -> bool {
        matches!(
            self,
            StoreError::AuthorizationDenied { .. }
                | StoreError::NotFound { .. }
                | StoreError::Invalid { .. }
                | StoreError::Conflict(_)
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Transient(format!("I/O error: {value}"))
    }
}
