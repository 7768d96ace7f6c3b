//! Caus runtime
//!
//! Backend fetchers, the fetcher registry, the scatter/gather alignment
//! pipeline with its canonical table codec, and the causal engine clients.

pub mod engine;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod registry;

pub use engine::{
    Discoverer, Estimator, GrpcEngine, MockDiscoverer, MockEstimator, MockSimulator, NoopEngine,
    Simulator, ENGINE_CALL_TIMEOUT,
};
pub use error::{Result, RuntimeError};
pub use fetcher::{
    ClickHouseFetcher, CsvFetcher, DatadogFetcher, Fetcher, MemoryFetcher, PrometheusFetcher,
    RandomFetcher,
};
pub use pipeline::{AlignedTable, AlignmentPipeline};
pub use registry::{FactoryTable, FetcherRegistry};
