//! CausalService - orchestrates alignment and remote engine calls
//!
//! Every operation validates the variables, builds a fresh fetcher
//! registry, aligns the window into the canonical table and hands that
//! table to the matching engine role. Registries are never reused across
//! operations.

use crate::builder::CausalServiceBuilder;
use crate::error::{Result, SdkError};
use caus_core::{
    CausalGraph, DiscoverRequest, EstimateRequest, EstimateResult, Intervention,
    SimulateRequest, SimulationResult, TimeWindow, ValidationPolicy, VariableDefinition,
};
use caus_runtime::{
    AlignedTable, AlignmentPipeline, Discoverer, Estimator, FactoryTable, FetcherRegistry,
    Simulator,
};
use std::sync::Arc;
use tracing::info;

/// Discovery arguments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoverOptions {
    /// Maximum lag in steps, `>= 0`
    pub max_lag: i32,

    /// Significance level in `(0, 1]`
    pub significance_level: f32,
}

impl DiscoverOptions {
    pub fn new(max_lag: i32, significance_level: f32) -> Self {
        Self {
            max_lag,
            significance_level,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_lag < 0 {
            return Err(SdkError::InvalidArgument(format!(
                "max lag must be >= 0, got {}",
                self.max_lag
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level <= 1.0) {
            return Err(SdkError::InvalidArgument(format!(
                "significance level must be in (0, 1], got {}",
                self.significance_level
            )));
        }
        Ok(())
    }
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self::new(3, 0.05)
    }
}

/// Simulation arguments
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    pub graph: CausalGraph,
    pub intervention: Intervention,

    /// Simulated steps, `>= 0`
    pub horizon: i32,
}

/// Orchestrates variable alignment and the remote causal engine
pub struct CausalService {
    pub(crate) factories: FactoryTable,
    pub(crate) validation: ValidationPolicy,
    pub(crate) pipeline: AlignmentPipeline,
    pub(crate) discoverer: Arc<dyn Discoverer>,
    pub(crate) estimator: Arc<dyn Estimator>,
    pub(crate) simulator: Arc<dyn Simulator>,
}

impl CausalService {
    pub fn builder() -> CausalServiceBuilder {
        CausalServiceBuilder::new()
    }

    pub fn validation_policy(&self) -> &ValidationPolicy {
        &self.validation
    }

    /// Fetch and align `variables` over `window`
    pub async fn align(
        &self,
        variables: &[VariableDefinition],
        window: &TimeWindow,
    ) -> Result<AlignedTable> {
        self.validation.validate_all(variables)?;
        let registry = FetcherRegistry::build(self.factories.clone(), variables).await?;
        let table = self.pipeline.run_window(&registry, variables, window).await?;
        Ok(table)
    }

    /// Discover a causal graph
    pub async fn discover(
        &self,
        variables: &[VariableDefinition],
        window: &TimeWindow,
        options: DiscoverOptions,
    ) -> Result<CausalGraph> {
        options.validate()?;
        let table = self.align(variables, window).await?.to_csv_string()?;

        info!(
            "Running discovery (max_lag={}, alpha={})",
            options.max_lag, options.significance_level
        );
        let graph = self
            .discoverer
            .discover(DiscoverRequest {
                table,
                max_lag: options.max_lag,
                significance_level: options.significance_level,
            })
            .await?;

        info!(
            "Discovery returned {} node(s) and {} edge(s)",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// Fit per-node linear models on `graph`
    pub async fn estimate(
        &self,
        variables: &[VariableDefinition],
        window: &TimeWindow,
        graph: CausalGraph,
    ) -> Result<EstimateResult> {
        let table = self.align(variables, window).await?.to_csv_string()?;

        info!("Running estimation over {} edge(s)", graph.edges.len());
        let result = self.estimator.estimate(EstimateRequest { table, graph }).await?;
        Ok(result)
    }

    /// Simulate an intervention
    ///
    /// The intervention target must be one of `variables`; this is checked
    /// before anything is fetched.
    pub async fn simulate(
        &self,
        variables: &[VariableDefinition],
        window: &TimeWindow,
        options: SimulateOptions,
    ) -> Result<SimulationResult> {
        if options.horizon < 0 {
            return Err(SdkError::InvalidArgument(format!(
                "horizon must be >= 0, got {}",
                options.horizon
            )));
        }
        let target = &options.intervention.target;
        if !variables.iter().any(|v| &v.name == target) {
            return Err(SdkError::InvalidArgument(format!(
                "intervention target '{}' is not a configured variable",
                target
            )));
        }

        let table = self.align(variables, window).await?.to_csv_string()?;

        info!(
            "Running simulation: {} over {} step(s)",
            options.intervention.describe(),
            options.horizon
        );
        let result = self
            .simulator
            .simulate(SimulateRequest {
                table,
                graph: options.graph,
                intervention: options.intervention,
                horizon: options.horizon,
            })
            .await?;
        Ok(result)
    }
}
