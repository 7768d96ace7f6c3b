//! Backend fetchers
//!
//! A fetcher turns one variable definition plus a normalized window into a
//! sparse [`TimeSeries`]. Every key it returns must already sit on the
//! window's grid; gaps are left for the pipeline to fill.

mod clickhouse;
mod csv_file;
mod datadog;
mod memory;
mod prometheus;
mod random;

pub use self::clickhouse::{ClickHouseFetcher, SpanQuery};
pub use self::csv_file::CsvFetcher;
pub use self::datadog::DatadogFetcher;
pub use self::memory::MemoryFetcher;
pub use self::prometheus::PrometheusFetcher;
pub use self::random::RandomFetcher;

use crate::error::{Result, RuntimeError};
use caus_core::{Source, TimeSeries, TimeWindow, VariableDefinition};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Per-request timeout for HTTP backends
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend fetcher
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the variable's series over `window`
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries>;

    /// Backend name used in logs
    fn name(&self) -> &str;
}

/// Build an HTTP client for `source`
pub(crate) fn http_client(source: &Source) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| connection_error(source, format!("failed to create HTTP client: {}", e)))
}

/// Parse the source location as a base URL, without trailing slash
pub(crate) fn base_url(source: &Source) -> Result<String> {
    let location = source.location.trim();
    reqwest::Url::parse(location)
        .map_err(|e| connection_error(source, format!("invalid URL '{}': {}", location, e)))?;
    Ok(location.trim_end_matches('/').to_string())
}

pub(crate) fn connection_error(source: &Source, message: impl Into<String>) -> RuntimeError {
    RuntimeError::Connection {
        kind: source.kind,
        implementation: source.implementation.clone(),
        message: message.into(),
    }
}

/// Unix milliseconds to a UTC timestamp
pub(crate) fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Insert `value` at its grid slot, dropping points outside the window
pub(crate) fn insert_aligned(
    series: &mut TimeSeries,
    window: &TimeWindow,
    t: DateTime<Utc>,
    value: f64,
) -> bool {
    if !value.is_finite() {
        return false;
    }
    match window.align(t) {
        Some(slot) => {
            series.insert(slot, value);
            true
        }
        None => false,
    }
}
