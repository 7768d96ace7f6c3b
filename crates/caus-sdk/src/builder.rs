//! Builder pattern for CausalService

use crate::causal_service::CausalService;
use caus_core::{FillPolicy, ValidationPolicy};
use caus_runtime::{
    AlignmentPipeline, Discoverer, Estimator, FactoryTable, NoopEngine, Simulator,
};
use std::sync::Arc;

/// Builder for CausalService
///
/// Engine roles that are not set fall back to [`NoopEngine`].
///
/// ```rust,ignore
/// let engine = Arc::new(GrpcEngine::connect_lazy("http://localhost:50051")?);
/// let service = CausalServiceBuilder::new()
///     .with_engine(engine)
///     .with_fill_policy(FillPolicy::standard())
///     .build();
/// ```
#[derive(Default)]
pub struct CausalServiceBuilder {
    factories: Option<FactoryTable>,
    validation: Option<ValidationPolicy>,
    fill_policy: Option<FillPolicy>,
    discoverer: Option<Arc<dyn Discoverer>>,
    estimator: Option<Arc<dyn Estimator>>,
    simulator: Option<Arc<dyn Simulator>>,
}

impl CausalServiceBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher factories; defaults to [`FactoryTable::standard`]
    pub fn with_factories(mut self, factories: FactoryTable) -> Self {
        self.factories = Some(factories);
        self
    }

    pub fn with_validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.validation = Some(policy);
        self
    }

    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.fill_policy = Some(policy);
        self
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn Estimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn Simulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Use one engine for all three roles
    pub fn with_engine<E>(self, engine: Arc<E>) -> Self
    where
        E: Discoverer + Estimator + Simulator + 'static,
    {
        self.with_discoverer(engine.clone())
            .with_estimator(engine.clone())
            .with_simulator(engine)
    }

    /// Build the service
    pub fn build(self) -> CausalService {
        let noop = Arc::new(NoopEngine);
        CausalService {
            factories: self.factories.unwrap_or_else(FactoryTable::standard),
            validation: self.validation.unwrap_or_default(),
            pipeline: AlignmentPipeline::new(self.fill_policy.unwrap_or_default()),
            discoverer: self.discoverer.unwrap_or_else(|| noop.clone()),
            estimator: self.estimator.unwrap_or_else(|| noop.clone()),
            simulator: self.simulator.unwrap_or(noop),
        }
    }
}
