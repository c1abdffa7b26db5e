//! Evaluation error types.

use thiserror::Error;
use warpscale_core::FleetError;

/// Errors that abort the evaluation of a single group.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("fleet call failed: {0}")]
    Fleet(#[from] FleetError),

    #[error("group not found: {0}")]
    GroupNotFound(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
