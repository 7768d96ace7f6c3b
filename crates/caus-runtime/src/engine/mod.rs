//! Causal engine clients
//!
//! Discovery, estimation and simulation run in a remote engine. Each role is
//! a trait so the service can be wired to the gRPC client, the no-op client
//! or a recording mock.

mod grpc;
mod mock;
mod noop;

// Generated from proto/causal.proto
pub mod proto {
    tonic::include_proto!("causal.v1alpha1");
}

pub use grpc::GrpcEngine;
pub use mock::{MockDiscoverer, MockEstimator, MockSimulator, RecordingEngine};
pub use noop::NoopEngine;

use crate::error::Result;
use async_trait::async_trait;
use caus_core::{
    CausalGraph, DiscoverRequest, EstimateRequest, EstimateResult, SimulateRequest,
    SimulationResult,
};
use std::time::Duration;

/// Per-call timeout for remote engine invocations
pub const ENGINE_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Causal structure discovery
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(&self, request: DiscoverRequest) -> Result<CausalGraph>;
}

/// Structural model estimation
#[async_trait]
pub trait Estimator: Send + Sync {
    async fn estimate(&self, request: EstimateRequest) -> Result<EstimateResult>;
}

/// Counterfactual simulation
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, request: SimulateRequest) -> Result<SimulationResult>;
}
