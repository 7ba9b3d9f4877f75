//! Error types for control model construction.

use pl_core::CoreError;
use thiserror::Error;

/// Result type for control model operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while building a closed-loop model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// A parameter violates its precondition (non-positive time constant,
    /// non-finite value, inverted limits).
    #[error("Invalid argument: {0}")]
    InvalidArg(#[from] CoreError),

    /// A signal description is malformed.
    #[error("Invalid signal: {what}")]
    InvalidSignal { what: String },
}
