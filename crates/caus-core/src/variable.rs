//! Variable definitions
//!
//! A variable is one named, independently sourced time series. Definitions
//! are parsed once from configuration, validated against a
//! [`ValidationPolicy`](crate::policy::ValidationPolicy) and treated as
//! read-only for the rest of a run.

use crate::error::{CoreError, Result};
use crate::policy::ValidationPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of backend a variable is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Metrics stores (Prometheus, Datadog, flat files)
    Metrics,

    /// Trace stores (ClickHouse, Datadog APM)
    Traces,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Metrics => "metrics",
            SourceKind::Traces => "traces",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a variable comes from
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Backend identifier (e.g. "prometheus", "clickhouse", "csv")
    #[serde(rename = "impl", alias = "implementation")]
    pub implementation: String,

    /// Connection string, URL or file path
    #[serde(rename = "loc", alias = "location", default)]
    pub location: String,

    /// Opaque API key handed to the backend client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Opaque application key handed to the backend client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
}

impl Source {
    pub fn new(
        kind: SourceKind,
        implementation: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            implementation: implementation.into(),
            location: location.into(),
            api_key: None,
            app_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_app_key(mut self, key: impl Into<String>) -> Self {
        self.app_key = Some(key.into());
        self
    }
}

// Keys never end up in logs.
impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("kind", &self.kind)
            .field("implementation", &self.implementation)
            .field("location", &self.location)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("app_key", &self.app_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Trace dimension being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// Number of spans (additive, absence means zero)
    Calls,

    /// Span duration
    Duration,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Calls => "calls",
            Dimension::Duration => "duration",
        }
    }

    /// Aggregation used when a trace query does not name one
    pub fn default_aggregation(&self) -> Aggregation {
        match self {
            Dimension::Calls => Aggregation::Count,
            Dimension::Duration => Aggregation::Avg,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation applied to a trace dimension per time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    RatePerSec,
    Avg,
    P50,
    P95,
    P99,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::RatePerSec => "rate_per_sec",
            Aggregation::Avg => "avg",
            Aggregation::P50 => "p50",
            Aggregation::P95 => "p95",
            Aggregation::P99 => "p99",
        }
    }

    /// Quantile level for percentile aggregations
    pub fn quantile(&self) -> Option<f64> {
        match self {
            Aggregation::P50 => Some(0.50),
            Aggregation::P95 => Some(0.95),
            Aggregation::P99 => Some(0.99),
            _ => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator of a span attribute predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOperator {
    Equals,
    Contains,
    IsNotNull,
}

impl AttributeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeOperator::Equals => "equals",
            AttributeOperator::Contains => "contains",
            AttributeOperator::IsNotNull => "isnotnull",
        }
    }
}

impl fmt::Display for AttributeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Span attribute predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeQuery {
    pub key: String,

    #[serde(default)]
    pub value: String,

    pub operator: AttributeOperator,
}

impl AttributeQuery {
    pub fn new(key: impl Into<String>, operator: AttributeOperator, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            operator,
        }
    }

    /// `error = true` is matched against span status as well as the attribute
    pub fn is_error_flag(&self) -> bool {
        self.key == "error" && self.value == "true"
    }
}

/// Structured trace aggregation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceQuery {
    /// Service name
    pub service: String,

    /// Span name filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_name: Option<String>,

    /// Span kind filter (e.g. "Server", "Client")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_kind: Option<String>,

    /// Measured dimension
    pub dimension: Dimension,

    /// Per-bucket aggregation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,

    /// Attribute predicates, all of which must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_queries: Vec<AttributeQuery>,
}

impl TraceQuery {
    pub fn new(service: impl Into<String>, dimension: Dimension) -> Self {
        Self {
            service: service.into(),
            span_name: None,
            span_kind: None,
            dimension,
            aggregation: None,
            attribute_queries: Vec::new(),
        }
    }

    pub fn with_span_name(mut self, name: impl Into<String>) -> Self {
        self.span_name = Some(name.into());
        self
    }

    pub fn with_span_kind(mut self, kind: impl Into<String>) -> Self {
        self.span_kind = Some(kind.into());
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_attribute(mut self, query: AttributeQuery) -> Self {
        self.attribute_queries.push(query);
        self
    }

    /// Aggregation to run, falling back to the dimension default
    pub fn effective_aggregation(&self) -> Aggregation {
        self.aggregation
            .unwrap_or_else(|| self.dimension.default_aggregation())
    }
}

/// Validated description of one named series and where it comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Unique name within a run; becomes the column header
    pub name: String,

    /// Backend source
    pub source: Source,

    /// Free-form metrics query (metrics sources only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_query: Option<String>,

    /// Structured trace query (trace sources only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_query: Option<TraceQuery>,
}

impl VariableDefinition {
    /// Create a metrics variable
    pub fn metrics(name: impl Into<String>, source: Source, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            metrics_query: Some(query.into()),
            trace_query: None,
        }
    }

    /// Create a trace variable
    pub fn traces(name: impl Into<String>, source: Source, query: TraceQuery) -> Self {
        Self {
            name: name.into(),
            source,
            metrics_query: None,
            trace_query: Some(query),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind
    }

    /// Trace dimension, if this is a trace variable
    pub fn dimension(&self) -> Option<Dimension> {
        match self.source.kind {
            SourceKind::Traces => self.trace_query.as_ref().map(|q| q.dimension),
            SourceKind::Metrics => None,
        }
    }

    /// Validate this definition against a policy
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_variable(&self.name, "name is required"));
        }

        if self.source.implementation.trim().is_empty() {
            return Err(CoreError::invalid_variable(
                &self.name,
                "source implementation is required",
            ));
        }

        match self.source.kind {
            SourceKind::Metrics => {
                if self.trace_query.is_some() {
                    return Err(CoreError::invalid_variable(
                        &self.name,
                        "metrics variables must not carry a trace_query",
                    ));
                }
                match self.metrics_query.as_deref() {
                    Some(q) if !q.trim().is_empty() => Ok(()),
                    _ => Err(CoreError::invalid_variable(
                        &self.name,
                        "metrics variables require a metrics_query",
                    )),
                }
            }
            SourceKind::Traces => {
                if self.metrics_query.is_some() {
                    return Err(CoreError::invalid_variable(
                        &self.name,
                        "trace variables must not carry a metrics_query",
                    ));
                }
                match &self.trace_query {
                    Some(query) => policy.check_trace_query(&self.name, query),
                    None => Err(CoreError::invalid_variable(
                        &self.name,
                        "trace variables require a trace_query",
                    )),
                }
            }
        }
    }
}
