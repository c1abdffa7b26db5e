//! Error types for the warpscale fleet store.

use thiserror::Error;
use warpscale_core::FleetError;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StateError> for FleetError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => FleetError::NotFound(what),
            other => FleetError::Store(other.to_string()),
        }
    }
}
