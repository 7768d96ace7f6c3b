//! ClickHouse trace fetcher
//!
//! Aggregates OpenTelemetry spans from `default.otel_traces` over the HTTP
//! interface. Every user supplied value travels as a server-side query
//! parameter (`param_<name>`), never spliced into the SQL text.
//!
//! Credentials map onto the HTTP interface headers: `app_key` is sent as
//! `X-ClickHouse-User` and `api_key` as `X-ClickHouse-Key`.

use super::{base_url, connection_error, from_unix_millis, http_client, insert_aligned, Fetcher};
use crate::error::{Result, RuntimeError};
use caus_core::{
    Aggregation, AttributeOperator, Dimension, Source, TimeSeries, TimeWindow, TraceQuery,
    VariableDefinition,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fmt::Write;

const BACKEND: &str = "clickhouse";
const SPANS_TABLE: &str = "default.otel_traces";

/// ClickHouse trace fetcher
#[derive(Debug, Clone)]
pub struct ClickHouseFetcher {
    client: reqwest::Client,
    base_url: String,
    user: Option<String>,
    key: Option<String>,
}

/// SQL text plus its server-side parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpanQuery {
    pub sql: String,
    pub params: Vec<(String, String)>,
}

impl SpanQuery {
    /// Build the bucketed aggregation for `query` over `window`
    ///
    /// Buckets are whole minutes, at least one. The last bucket covers
    /// `[end, end + step)`.
    pub fn build(query: &TraceQuery, window: &TimeWindow) -> Self {
        let interval_minutes = (window.step_seconds() / 60).max(1);
        let value = aggregate_expr(query, interval_minutes);

        let mut sql = format!(
            "SELECT toUnixTimestamp(toStartOfInterval(Timestamp, INTERVAL {} minute)) AS time, {} AS value \
             FROM {} \
             WHERE Timestamp >= toDateTime({{start:Int64}}, 'UTC') AND Timestamp < toDateTime({{end:Int64}}, 'UTC')",
            interval_minutes, value, SPANS_TABLE
        );
        let mut params = vec![
            ("start".to_string(), window.start().timestamp().to_string()),
            (
                "end".to_string(),
                (window.end() + window.step()).timestamp().to_string(),
            ),
        ];

        if !query.service.is_empty() {
            sql.push_str(" AND ServiceName = {service:String}");
            params.push(("service".to_string(), query.service.clone()));
        }
        if let Some(name) = query.span_name.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(" AND SpanName = {span_name:String}");
            params.push(("span_name".to_string(), name.to_string()));
        }
        if let Some(kind) = query.span_kind.as_deref().filter(|s| !s.is_empty()) {
            sql.push_str(" AND SpanKind = {span_kind:String}");
            params.push(("span_kind".to_string(), kind.to_string()));
        }

        for (i, attribute) in query.attribute_queries.iter().enumerate() {
            // Error spans are flagged either by attribute or by status code.
            if attribute.is_error_flag() {
                sql.push_str(" AND (SpanAttributes['error'] = 'true' OR StatusCode = 'Error')");
                continue;
            }

            let key = format!("attr_key_{}", i);
            let val = format!("attr_value_{}", i);
            match attribute.operator {
                AttributeOperator::Equals => {
                    let _ = write!(sql, " AND SpanAttributes[{{{key}:String}}] = {{{val}:String}}");
                    params.push((key, attribute.key.clone()));
                    params.push((val, attribute.value.clone()));
                }
                AttributeOperator::Contains => {
                    let _ = write!(sql, " AND SpanAttributes[{{{key}:String}}] ILIKE {{{val}:String}}");
                    params.push((key, attribute.key.clone()));
                    params.push((val, format!("%{}%", attribute.value)));
                }
                AttributeOperator::IsNotNull => {
                    let _ = write!(sql, " AND mapContains(SpanAttributes, {{{key}:String}})");
                    params.push((key, attribute.key.clone()));
                }
            }
        }

        sql.push_str(" GROUP BY time ORDER BY time FORMAT JSONEachRow");

        Self { sql, params }
    }
}

fn aggregate_expr(query: &TraceQuery, interval_minutes: i64) -> String {
    match (query.dimension, query.effective_aggregation()) {
        (Dimension::Calls, Aggregation::RatePerSec) => {
            format!("count() / {}", interval_minutes * 60)
        }
        (Dimension::Calls, _) => "count()".to_string(),
        (Dimension::Duration, aggregation) => match aggregation.quantile() {
            Some(q) => format!("quantile({:.2})(Duration)", q),
            None => "avg(Duration)".to_string(),
        },
    }
}

/// One `JSONEachRow` line
#[derive(Debug, Deserialize)]
struct SpanRow {
    time: Scalar,
    value: Scalar,
}

/// 64-bit integers arrive quoted by default
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Number(secs) => from_unix_millis((*secs * 1000.0) as i64),
            Scalar::Text(s) => {
                if let Ok(secs) = s.parse::<i64>() {
                    return DateTime::from_timestamp(secs, 0);
                }
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map(|naive| naive.and_utc())
                    .or_else(|_| DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)))
                    .ok()
            }
        }
    }
}

impl ClickHouseFetcher {
    /// Create the client and probe the server with `/ping`
    pub async fn connect(source: &Source) -> Result<Self> {
        let fetcher = Self {
            client: http_client(source)?,
            base_url: base_url(source)?,
            user: source.app_key.clone(),
            key: source.api_key.clone(),
        };

        let response = fetcher
            .client
            .get(format!("{}/ping", fetcher.base_url))
            .send()
            .await
            .map_err(|e| connection_error(source, format!("ping failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(connection_error(
                source,
                format!("ping failed with status: {}", response.status()),
            ));
        }

        tracing::info!("Connected to ClickHouse at {}", fetcher.base_url);
        Ok(fetcher)
    }

    fn parse_rows(body: &str, window: &TimeWindow) -> Result<TimeSeries> {
        let mut series = TimeSeries::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let row: SpanRow = serde_json::from_str(line)
                .map_err(|e| RuntimeError::backend(BACKEND, format!("invalid row '{}': {}", line, e)))?;
            let t = row.time.as_time().ok_or_else(|| {
                RuntimeError::backend(BACKEND, format!("failed to parse time in '{}'", line))
            })?;
            let value = row.value.as_f64().ok_or_else(|| {
                RuntimeError::backend(BACKEND, format!("failed to parse value in '{}'", line))
            })?;
            insert_aligned(&mut series, window, t, value);
        }
        Ok(series)
    }
}

#[async_trait::async_trait]
impl Fetcher for ClickHouseFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        let query = variable
            .trace_query
            .as_ref()
            .ok_or_else(|| RuntimeError::backend(BACKEND, "variable has no trace_query"))?;

        let span_query = SpanQuery::build(query, window);
        tracing::debug!("ClickHouse query for '{}': {}", variable.name, span_query.sql);

        let params: Vec<(String, String)> = span_query
            .params
            .iter()
            .map(|(name, value)| (format!("param_{}", name), value.clone()))
            .collect();

        let mut request = self
            .client
            .post(format!("{}/", self.base_url))
            .query(&params)
            .body(span_query.sql);
        if let Some(user) = &self.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(key) = &self.key {
            request = request.header("X-ClickHouse-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RuntimeError::backend(BACKEND, format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(RuntimeError::backend(
                BACKEND,
                format!("status {}: {}", status, body.trim()),
            ));
        }

        Self::parse_rows(&body, window)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caus_core::{AttributeQuery, SourceKind};
    use chrono::TimeZone;
    use mockito::Matcher;
    use std::time::Duration;

    fn window(step_secs: u64) -> TimeWindow {
        TimeWindow::aligned(
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 10, 1, 10, 4, 0).unwrap(),
            Duration::from_secs(step_secs),
        )
        .unwrap()
    }

    fn param<'a>(q: &'a SpanQuery, name: &str) -> Option<&'a str> {
        q.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_calls_query() {
        let query = TraceQuery::new("frontend", Dimension::Calls).with_span_kind("Server");
        let q = SpanQuery::build(&query, &window(60));

        assert!(q.sql.contains("INTERVAL 1 minute"));
        assert!(q.sql.contains("count() AS value"));
        assert!(q.sql.contains("ServiceName = {service:String}"));
        assert!(q.sql.contains("SpanKind = {span_kind:String}"));
        assert!(!q.sql.contains("SpanName"));
        assert!(q.sql.ends_with("GROUP BY time ORDER BY time FORMAT JSONEachRow"));
        assert_eq!(param(&q, "service"), Some("frontend"));
        assert_eq!(param(&q, "start"), Some("1696154400"));
        assert_eq!(param(&q, "end"), Some("1696154700"));
    }

    #[test]
    fn test_duration_quantile_and_sub_minute_step() {
        let query = TraceQuery::new("db", Dimension::Duration).with_aggregation(Aggregation::P95);
        let q = SpanQuery::build(&query, &window(15));
        assert!(q.sql.contains("INTERVAL 1 minute"));
        assert!(q.sql.contains("quantile(0.95)(Duration) AS value"));

        let avg = SpanQuery::build(&TraceQuery::new("db", Dimension::Duration), &window(300));
        assert!(avg.sql.contains("INTERVAL 5 minute"));
        assert!(avg.sql.contains("avg(Duration) AS value"));
    }

    #[test]
    fn test_rate_per_sec_divides_by_bucket_seconds() {
        let query =
            TraceQuery::new("api", Dimension::Calls).with_aggregation(Aggregation::RatePerSec);
        let q = SpanQuery::build(&query, &window(120));
        assert!(q.sql.contains("count() / 120 AS value"));
    }

    #[test]
    fn test_attribute_predicates_are_parameterized() {
        let query = TraceQuery::new("api", Dimension::Calls)
            .with_attribute(AttributeQuery::new("http.route", AttributeOperator::Equals, "/pay"))
            .with_attribute(AttributeQuery::new("user.agent", AttributeOperator::Contains, "bot"))
            .with_attribute(AttributeQuery::new("tenant", AttributeOperator::IsNotNull, ""))
            .with_attribute(AttributeQuery::new("error", AttributeOperator::Equals, "true"));
        let q = SpanQuery::build(&query, &window(60));

        assert!(q.sql.contains("SpanAttributes[{attr_key_0:String}] = {attr_value_0:String}"));
        assert!(q.sql.contains("SpanAttributes[{attr_key_1:String}] ILIKE {attr_value_1:String}"));
        assert!(q.sql.contains("mapContains(SpanAttributes, {attr_key_2:String})"));
        assert!(q.sql.contains("(SpanAttributes['error'] = 'true' OR StatusCode = 'Error')"));
        assert!(!q.sql.contains("/pay"));
        assert_eq!(param(&q, "attr_value_1"), Some("%bot%"));
        assert_eq!(param(&q, "attr_key_3"), None);
    }

    #[test]
    fn test_parse_rows_accepts_quoted_and_text_times() {
        let body = concat!(
            "{\"time\":1696154400,\"value\":\"12\"}\n",
            "{\"time\":\"2023-10-01 10:01:00\",\"value\":3.5}\n",
            "{\"time\":\"2023-10-01T10:09:00Z\",\"value\":1}\n",
        );
        let series = ClickHouseFetcher::parse_rows(body, &window(60)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[&Utc.with_ymd_and_hms(2023, 10, 1, 10, 0, 0).unwrap()],
            12.0
        );
        assert_eq!(
            series[&Utc.with_ymd_and_hms(2023, 10, 1, 10, 1, 0).unwrap()],
            3.5
        );
    }

    #[test]
    fn test_parse_rows_rejects_bad_time() {
        let err = ClickHouseFetcher::parse_rows("{\"time\":\"yesterday\",\"value\":1}", &window(60))
            .unwrap_err();
        assert!(err.to_string().contains("failed to parse time"));
    }

    #[tokio::test]
    async fn test_connect_and_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body("Ok.\n")
            .create_async()
            .await;
        let query_mock = server
            .mock("POST", "/")
            .match_query(Matcher::UrlEncoded(
                "param_service".into(),
                "frontend".into(),
            ))
            .match_header("X-ClickHouse-User", "reader")
            .with_status(200)
            .with_body("{\"time\":1696154460,\"value\":\"7\"}\n")
            .create_async()
            .await;

        let source = Source::new(SourceKind::Traces, "clickhouse", server.url()).with_app_key("reader");
        let fetcher = ClickHouseFetcher::connect(&source).await.unwrap();
        let variable =
            VariableDefinition::traces("front_calls", source, TraceQuery::new("frontend", Dimension::Calls));

        let series = fetcher.fetch(&variable, &window(60)).await.unwrap();
        query_mock.assert_async().await;
        assert_eq!(series.values().copied().collect::<Vec<_>>(), vec![7.0]);
    }

    #[tokio::test]
    async fn test_connect_fails_when_ping_fails() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/ping").with_status(503).create_async().await;

        let source = Source::new(SourceKind::Traces, "clickhouse", server.url());
        let err = ClickHouseFetcher::connect(&source).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Connection { .. }));
    }
}
