//! Error types for caus Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A variable definition failed validation
    #[error("Invalid variable '{variable}': {reason}")]
    InvalidVariable { variable: String, reason: String },

    /// Two variables share a name
    #[error("Duplicate variable name: {0}")]
    DuplicateVariable(String),

    /// Time window is empty, inverted or has a non-positive step
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// Simulation trace could not be decoded
    #[error("Invalid simulation trace: {0}")]
    InvalidTrace(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub(crate) fn invalid_variable(variable: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidVariable {
            variable: variable.to_string(),
            reason: reason.into(),
        }
    }
}
