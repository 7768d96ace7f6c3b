//! caus Core - Core types and definitions for the caus pipeline
//!
//! This crate provides the fundamental types used across the caus workspace:
//! - Variable definitions and the policies they are validated against
//! - Time windows, step grids and sparse time series
//! - Causal engine request/result types
//! - Error types

pub mod causal;
pub mod error;
pub mod policy;
pub mod series;
pub mod variable;

// Re-export commonly used types
pub use causal::{
    CausalGraph, DiscoverRequest, Edge, EstimateRequest, EstimateResult, Intervention,
    InterventionAction, LinearModel, MetricTrace, Node, SimulateRequest, SimulationResult,
    SimulationTrace,
};
pub use error::{CoreError, Result};
pub use policy::{FillPolicy, GapFill, ValidationPolicy};
pub use series::{TimeSeries, TimeWindow};
pub use variable::{
    Aggregation, AttributeOperator, AttributeQuery, Dimension, Source, SourceKind, TraceQuery,
    VariableDefinition,
};
