//! Prometheus fetcher
//!
//! Issues a `query_range` call over the HTTP API and expects a matrix with
//! exactly one series.

use super::{base_url, from_unix_millis, http_client, insert_aligned, Fetcher};
use crate::error::{Result, RuntimeError};
use caus_core::{Source, TimeSeries, TimeWindow, VariableDefinition};
use serde::Deserialize;
use std::collections::HashMap;

const BACKEND: &str = "prometheus";

/// Prometheus HTTP API fetcher
#[derive(Debug, Clone)]
pub struct PrometheusFetcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryRangeData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryRangeData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<RangeSeries>,
}

#[derive(Debug, Deserialize)]
struct RangeSeries {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[unix_seconds, "value"]` pairs
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PrometheusFetcher {
    pub fn new(source: &Source) -> Result<Self> {
        Ok(Self {
            client: http_client(source)?,
            base_url: base_url(source)?,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for PrometheusFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        let query = variable
            .metrics_query
            .as_deref()
            .ok_or_else(|| RuntimeError::backend(BACKEND, "variable has no metrics_query"))?;

        let url = format!("{}/api/v1/query_range", self.base_url);
        let params = [
            ("query", query.to_string()),
            ("start", window.start().timestamp().to_string()),
            ("end", window.end().timestamp().to_string()),
            ("step", format!("{}s", window.step_seconds())),
        ];

        tracing::debug!("Prometheus query_range for '{}': {}", variable.name, query);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("failed to read body: {}", e)))?;

        // Error responses still carry a JSON envelope when the server produced them.
        let parsed: QueryRangeResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RuntimeError::backend(
                    BACKEND,
                    format!("HTTP request failed with status: {}", status),
                ))
            }
            Err(e) => {
                return Err(RuntimeError::backend(
                    BACKEND,
                    format!("failed to parse response: {}", e),
                ))
            }
        };

        if parsed.status != "success" {
            return Err(RuntimeError::backend(
                BACKEND,
                format!(
                    "{}: {}",
                    parsed.error_type.as_deref().unwrap_or("error"),
                    parsed.error.as_deref().unwrap_or("unknown error")
                ),
            ));
        }

        let data = parsed
            .data
            .ok_or_else(|| RuntimeError::backend(BACKEND, "response has no data"))?;

        if data.result_type != "matrix" {
            return Err(RuntimeError::backend(
                BACKEND,
                format!("expected matrix result, got {}", data.result_type),
            ));
        }

        let mut result = data.result;
        if result.len() != 1 {
            return Err(RuntimeError::UnexpectedCardinality {
                backend: BACKEND.to_string(),
                count: result.len(),
            });
        }
        let stream = result.remove(0);
        tracing::debug!("Series labels for '{}': {:?}", variable.name, stream.metric);

        let mut series = TimeSeries::new();
        for (seconds, raw) in stream.values {
            let value: f64 = raw.parse().map_err(|_| {
                RuntimeError::backend(BACKEND, format!("invalid sample value '{}'", raw))
            })?;
            if let Some(t) = from_unix_millis((seconds * 1000.0).round() as i64) {
                insert_aligned(&mut series, window, t, value);
            }
        }

        Ok(series)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caus_core::SourceKind;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use std::time::Duration;

    fn window() -> TimeWindow {
        TimeWindow::aligned(
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 2, 0).unwrap(),
            Duration::from_secs(60),
        )
        .unwrap()
    }

    fn var() -> VariableDefinition {
        VariableDefinition::metrics(
            "cpu",
            Source::new(SourceKind::Metrics, "prometheus", "http://unused"),
            "avg(cpu_usage)",
        )
    }

    fn fetcher(url: &str) -> PrometheusFetcher {
        PrometheusFetcher::new(&Source::new(SourceKind::Metrics, "prometheus", url)).unwrap()
    }

    #[tokio::test]
    async fn test_single_series_is_aligned() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "avg(cpu_usage)".into()),
                Matcher::UrlEncoded("start".into(), "1696154400".into()),
                Matcher::UrlEncoded("end".into(), "1696154520".into()),
                Matcher::UrlEncoded("step".into(), "60s".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{"resultType":"matrix","result":[
                    {"metric":{"job":"node"},"values":[[1696154400,"1.5"],[1696154465.2,"2.5"]]}
                ]}}"#,
            )
            .create_async()
            .await;

        let series = fetcher(&server.url()).fetch(&var(), &window()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(series.len(), 2);
        let t1 = Utc.with_ymd_and_hms(2023, 10, 1, 10, 1, 0).unwrap();
        assert_eq!(series[&t1], 2.5);
    }

    #[tokio::test]
    async fn test_zero_series_is_cardinality_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#)
            .create_async()
            .await;

        let err = fetcher(&server.url()).fetch(&var(), &window()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::UnexpectedCardinality { count: 0, .. }));
    }

    #[tokio::test]
    async fn test_two_series_is_cardinality_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"resultType":"matrix","result":[
                    {"metric":{"a":"1"},"values":[]},{"metric":{"a":"2"},"values":[]}
                ]}}"#,
            )
            .create_async()
            .await;

        let err = fetcher(&server.url()).fetch(&var(), &window()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::UnexpectedCardinality { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_error_envelope_is_backend_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query_range")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
            .create_async()
            .await;

        let err = fetcher(&server.url()).fetch(&var(), &window()).await.unwrap_err();
        assert!(err.to_string().contains("bad_data: parse error"));
    }

    #[test]
    fn test_invalid_location() {
        let source = Source::new(SourceKind::Metrics, "prometheus", "not a url");
        assert!(matches!(
            PrometheusFetcher::new(&source),
            Err(RuntimeError::Connection { .. })
        ));
    }
}
