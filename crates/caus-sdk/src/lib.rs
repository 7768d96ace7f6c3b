//! caus SDK - High-level API for the caus pipeline
//!
//! This crate ties the pieces together:
//! - Variable configuration loading and validation
//! - [`CausalService`]: align variables, then discover, estimate or simulate
//! - Intervention expression parsing
//! - Effect reports and text renderers

pub mod builder;
pub mod causal_service;
pub mod config;
pub mod error;
pub mod intervention;
pub mod report;

pub use builder::CausalServiceBuilder;
pub use causal_service::{CausalService, DiscoverOptions, SimulateOptions};
pub use config::VariableConfig;
pub use error::{Result, SdkError};
pub use intervention::parse_intervention;
pub use report::{
    render_estimation, render_graph, render_simulation, EffectReport, PercentChange,
};

// Re-export commonly used types
pub use caus_core::{
    CausalGraph, EstimateResult, FillPolicy, Intervention, InterventionAction, SimulationResult,
    TimeWindow, ValidationPolicy, VariableDefinition,
};
pub use caus_runtime::{FactoryTable, GrpcEngine};
