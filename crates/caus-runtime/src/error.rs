//! Runtime error types

use caus_core::{CoreError, SourceKind};
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No fetcher family is registered for the source kind
    #[error("Unsupported source kind '{kind}' for variable '{variable}'")]
    UnsupportedSourceKind { variable: String, kind: SourceKind },

    /// The kind is known but the implementation is not
    #[error("Unsupported {kind} implementation '{implementation}' for variable '{variable}'")]
    UnsupportedImplementation {
        variable: String,
        kind: SourceKind,
        implementation: String,
    },

    /// Constructing or probing a backend client failed
    #[error("Failed to connect to {kind}/{implementation}: {message}")]
    Connection {
        kind: SourceKind,
        implementation: String,
        message: String,
    },

    /// The registry was asked for a fetcher it never built
    #[error("No fetcher resolved for {kind}/{implementation}")]
    FetcherNotResolved {
        kind: SourceKind,
        implementation: String,
    },

    /// Flat-file column lookup failed
    #[error("Column '{column}' not found in {location} (columns: {})", .header.join(", "))]
    ColumnNotFound {
        column: String,
        location: String,
        header: Vec<String>,
    },

    /// Flat file holds a header but no rows
    #[error("Dataset {location} has no data rows")]
    EmptyDataset { location: String },

    /// Backend request or response failure
    #[error("{backend} query failed: {message}")]
    BackendQuery { backend: String, message: String },

    /// Backend returned zero or several series where one was expected
    #[error("{backend} returned {count} series, expected exactly 1")]
    UnexpectedCardinality { backend: String, count: usize },

    /// A single variable failed during scatter
    #[error("Failed to fetch variable '{variable}': {cause}")]
    VariableFetchFailed {
        variable: String,
        #[source]
        cause: Box<RuntimeError>,
    },

    /// Table encoding failure
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Table decoding failure
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Timeout, transport failure or unreachable engine
    #[error("Causal engine unavailable during {operation}: {message}")]
    EngineUnavailable {
        operation: &'static str,
        message: String,
    },

    /// Engine answered with a non-transport error status
    #[error("Causal engine rejected {operation} ({code}): {message}")]
    EngineRejected {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// Domain validation failure
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RuntimeError {
    pub(crate) fn backend(backend: impl Into<String>, message: impl ToString) -> Self {
        RuntimeError::BackendQuery {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Error wrapped inside a per-variable failure, or `self`
    pub fn root_cause(&self) -> &RuntimeError {
        match self {
            RuntimeError::VariableFetchFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
