//! Datadog fetcher
//!
//! Queries the v1 `query` endpoint. Metrics queries are rolled up with
//! `avg`; trace variables address the APM metric `trace.<service>.<dimension>`.

use super::{base_url, connection_error, from_unix_millis, http_client, insert_aligned, Fetcher};
use crate::error::{Result, RuntimeError};
use caus_core::{Aggregation, Source, SourceKind, TimeSeries, TimeWindow, VariableDefinition};
use serde::Deserialize;

const BACKEND: &str = "datadog";

/// Datadog metrics API fetcher
#[derive(Clone)]
pub struct DatadogFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl std::fmt::Debug for DatadogFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogFetcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    series: Vec<QuerySeries>,
}

#[derive(Debug, Deserialize)]
struct QuerySeries {
    /// `[unix_millis, value]` pairs, either may be null
    #[serde(default)]
    pointlist: Vec<Vec<Option<f64>>>,
}

impl DatadogFetcher {
    /// Both keys are required
    pub fn new(source: &Source) -> Result<Self> {
        let api_key = source
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| connection_error(source, "datadog requires an api_key"))?;
        let app_key = source
            .app_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| connection_error(source, "datadog requires an app_key"))?;

        Ok(Self {
            client: http_client(source)?,
            base_url: base_url(source)?,
            api_key,
            app_key,
        })
    }

    /// Build the Datadog query string for `variable`
    pub fn build_query(variable: &VariableDefinition, window: &TimeWindow) -> Result<String> {
        let mut interval = window.step_seconds();
        if interval < 1 {
            interval = 60;
        }

        match variable.kind() {
            SourceKind::Metrics => {
                let query = variable
                    .metrics_query
                    .as_deref()
                    .ok_or_else(|| RuntimeError::backend(BACKEND, "variable has no metrics_query"))?;
                Ok(format!("{}.rollup(avg, {})", query, interval))
            }
            SourceKind::Traces => {
                let tq = variable
                    .trace_query
                    .as_ref()
                    .ok_or_else(|| RuntimeError::backend(BACKEND, "variable has no trace_query"))?;
                let metric = format!("trace.{}.{}", tq.service, tq.dimension);
                Ok(match tq.effective_aggregation() {
                    Aggregation::RatePerSec => {
                        format!("sum:{}.as_rate().rollup(sum, {})", metric, interval)
                    }
                    aggregation => format!(
                        "{agg}:{metric}.rollup({agg}, {interval})",
                        agg = aggregation,
                        metric = metric,
                        interval = interval
                    ),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for DatadogFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        let query = Self::build_query(variable, window)?;
        tracing::debug!("Datadog query for '{}': {}", variable.name, query);

        let response = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .query(&[
                ("from", window.start().timestamp().to_string()),
                ("to", window.end().timestamp().to_string()),
                ("query", query),
            ])
            .send()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RuntimeError::backend(
                BACKEND,
                format!("HTTP request failed with status: {}", response.status()),
            ));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("failed to parse response: {}", e)))?;

        if parsed.status.as_deref() == Some("error") {
            return Err(RuntimeError::backend(
                BACKEND,
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        if parsed.series.len() != 1 {
            return Err(RuntimeError::UnexpectedCardinality {
                backend: BACKEND.to_string(),
                count: parsed.series.len(),
            });
        }

        let mut series = TimeSeries::new();
        for point in &parsed.series[0].pointlist {
            if let [Some(millis), Some(value), ..] = point.as_slice() {
                if let Some(t) = from_unix_millis(*millis as i64) {
                    insert_aligned(&mut series, window, t, *value);
                }
            }
        }

        Ok(series)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
