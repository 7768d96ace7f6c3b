//! No-op engine
//!
//! Answers every call with an empty result without contacting anything.
//! An empty graph from this engine means "not computed", not "no edges".

use super::{Discoverer, Estimator, Simulator};
use crate::error::Result;
use async_trait::async_trait;
use caus_core::{
    CausalGraph, DiscoverRequest, EstimateRequest, EstimateResult, SimulateRequest,
    SimulationResult,
};

/// Engine that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEngine;

#[async_trait]
impl Discoverer for NoopEngine {
    async fn discover(&self, _request: DiscoverRequest) -> Result<CausalGraph> {
        tracing::debug!("Noop engine: skipping discovery");
        Ok(CausalGraph::default())
    }
}

#[async_trait]
impl Estimator for NoopEngine {
    async fn estimate(&self, _request: EstimateRequest) -> Result<EstimateResult> {
        tracing::debug!("Noop engine: skipping estimation");
        Ok(EstimateResult::default())
    }
}

#[async_trait]
impl Simulator for NoopEngine {
    async fn simulate(&self, _request: SimulateRequest) -> Result<SimulationResult> {
        tracing::debug!("Noop engine: skipping simulation");
        Ok(SimulationResult::new(r#"{"metrics":{}}"#))
    }
}
