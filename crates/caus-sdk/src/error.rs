//! SDK error types

use caus_core::CoreError;
use caus_runtime::RuntimeError;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid operation argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Variable validation error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Fetch, alignment or engine error
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Intervention text does not match `<name> <*|=> <number>`
    #[error("Invalid intervention format '{0}'. Wanted 'variable * 1.2' or 'variable = 500'")]
    InvalidInterventionFormat(String),

    /// Numeric literal could not be parsed
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Effect variable missing from the simulation output
    #[error("Effect variable '{0}' was not found in simulation results")]
    EffectVariableNotFound(String),

    /// Effect variable present but without samples
    #[error("No data was found for effect variable '{0}'")]
    EmptyEffectSeries(String),

    /// Original and simulated arrays differ in length
    #[error("Effect variable '{variable}' has {original} original but {simulated} simulated samples")]
    MismatchedEffectSeries {
        variable: String,
        original: usize,
        simulated: usize,
    },
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
