//! Fetcher registry
//!
//! Maps `(kind, implementation)` pairs to backend fetchers. Fetchers are
//! built lazily the first time a pair is seen and reused for every later
//! variable naming the same pair, so one backend gets one connection per run.

use crate::error::{Result, RuntimeError};
use crate::fetcher::{
    ClickHouseFetcher, CsvFetcher, DatadogFetcher, Fetcher, PrometheusFetcher, RandomFetcher,
};
use caus_core::{Source, SourceKind, VariableDefinition};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a fetcher from its source
pub type FetcherFactory =
    Arc<dyn Fn(Source) -> BoxFuture<'static, Result<Arc<dyn Fetcher>>> + Send + Sync>;

/// Available fetcher factories, grouped by kind then implementation
#[derive(Clone, Default)]
pub struct FactoryTable {
    factories: HashMap<SourceKind, HashMap<String, FetcherFactory>>,
}

impl FactoryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in backends
    ///
    /// metrics: random, csv, prometheus, datadog;
    /// traces: random, csv, clickhouse, datadog
    pub fn standard() -> Self {
        let mut table = Self::new();

        for kind in [SourceKind::Metrics, SourceKind::Traces] {
            table.register(kind, "random", |source: Source| async move {
                Ok::<_, RuntimeError>(Arc::new(RandomFetcher::from_location(&source.location)) as Arc<dyn Fetcher>)
            });
            table.register(kind, "csv", |source: Source| async move {
                Ok::<_, RuntimeError>(Arc::new(CsvFetcher::from_source(&source)?) as Arc<dyn Fetcher>)
            });
            table.register(kind, "datadog", |source: Source| async move {
                Ok::<_, RuntimeError>(Arc::new(DatadogFetcher::new(&source)?) as Arc<dyn Fetcher>)
            });
        }

        table.register(SourceKind::Metrics, "prometheus", |source: Source| async move {
            Ok::<_, RuntimeError>(Arc::new(PrometheusFetcher::new(&source)?) as Arc<dyn Fetcher>)
        });
        table.register(SourceKind::Traces, "clickhouse", |source: Source| async move {
            Ok::<_, RuntimeError>(Arc::new(ClickHouseFetcher::connect(&source).await?) as Arc<dyn Fetcher>)
        });

        table
    }

    /// Register a factory, replacing any previous one for the same pair
    pub fn register<F, Fut>(
        &mut self,
        kind: SourceKind,
        implementation: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(Source) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Fetcher>>> + Send + 'static,
    {
        let factory: FetcherFactory = Arc::new(move |source| factory(source).boxed());
        self.factories
            .entry(kind)
            .or_default()
            .insert(implementation.into(), factory);
        self
    }

    /// Serve every variable of the pair from one prebuilt fetcher
    pub fn with_fetcher(
        mut self,
        kind: SourceKind,
        implementation: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        self.register(kind, implementation, move |_source| {
            let fetcher = Arc::clone(&fetcher);
            async move { Ok::<_, RuntimeError>(fetcher) }
        });
        self
    }

    /// Fail on the first variable whose pair has no factory
    pub fn check(&self, variables: &[VariableDefinition]) -> Result<()> {
        for variable in variables {
            self.lookup(variable)?;
        }
        Ok(())
    }

    /// Registered implementations for `kind`, sorted
    pub fn implementations(&self, kind: SourceKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .factories
            .get(&kind)
            .map(|impls| impls.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn lookup(&self, variable: &VariableDefinition) -> Result<&FetcherFactory> {
        let kind = variable.kind();
        let impls = self
            .factories
            .get(&kind)
            .ok_or_else(|| RuntimeError::UnsupportedSourceKind {
                variable: variable.name.clone(),
                kind,
            })?;

        impls
            .get(&variable.source.implementation)
            .ok_or_else(|| RuntimeError::UnsupportedImplementation {
                variable: variable.name.clone(),
                kind,
                implementation: variable.source.implementation.clone(),
            })
    }
}

struct ResolvedFetcher {
    fetcher: Arc<dyn Fetcher>,

    /// Location the fetcher was built with
    location: String,
}

/// Per-run registry of constructed fetchers
pub struct FetcherRegistry {
    factories: FactoryTable,
    fetchers: HashMap<(SourceKind, String), ResolvedFetcher>,
}

impl FetcherRegistry {
    /// Create an empty registry over `factories`
    pub fn new(factories: FactoryTable) -> Self {
        Self {
            factories,
            fetchers: HashMap::new(),
        }
    }

    /// Resolve a fetcher for every variable up front
    ///
    /// Every pair is checked against the factory table before any fetcher
    /// is constructed, so an unsupported variable never follows a probe.
    pub async fn build(factories: FactoryTable, variables: &[VariableDefinition]) -> Result<Self> {
        factories.check(variables)?;
        let mut registry = Self::new(factories);
        for variable in variables {
            registry.resolve(variable).await?;
        }
        info!(
            "Fetcher registry ready: {} fetcher(s) for {} variable(s)",
            registry.len(),
            variables.len()
        );
        Ok(registry)
    }

    /// Fetcher for the variable's `(kind, implementation)`, built on first use
    ///
    /// A later variable naming the same pair with a different location is
    /// served by the first fetcher.
    pub async fn resolve(&mut self, variable: &VariableDefinition) -> Result<Arc<dyn Fetcher>> {
        let source = &variable.source;
        let key = (source.kind, source.implementation.clone());

        if let Some(resolved) = self.fetchers.get(&key) {
            if resolved.location != source.location {
                warn!(
                    "Variable '{}' uses {}/{} at '{}' but the fetcher was built for '{}'; reusing it",
                    variable.name, source.kind, source.implementation, source.location, resolved.location
                );
            }
            return Ok(Arc::clone(&resolved.fetcher));
        }

        let factory = self.factories.lookup(variable)?;
        debug!(
            "Building {}/{} fetcher for variable '{}'",
            source.kind, source.implementation, variable.name
        );

        let fetcher = factory(source.clone()).await.map_err(|e| match e {
            RuntimeError::Connection { .. } => e,
            other => RuntimeError::Connection {
                kind: source.kind,
                implementation: source.implementation.clone(),
                message: other.to_string(),
            },
        })?;

        self.fetchers.insert(
            key,
            ResolvedFetcher {
                fetcher: Arc::clone(&fetcher),
                location: source.location.clone(),
            },
        );
        Ok(fetcher)
    }

    /// Already-built fetcher for a pair
    pub fn get(&self, kind: SourceKind, implementation: &str) -> Result<Arc<dyn Fetcher>> {
        self.fetchers
            .get(&(kind, implementation.to_string()))
            .map(|resolved| Arc::clone(&resolved.fetcher))
            .ok_or_else(|| RuntimeError::FetcherNotResolved {
                kind,
                implementation: implementation.to_string(),
            })
    }

    pub fn contains(&self, kind: SourceKind, implementation: &str) -> bool {
        self.fetchers.contains_key(&(kind, implementation.to_string()))
    }

    /// Number of distinct fetchers built
    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}
