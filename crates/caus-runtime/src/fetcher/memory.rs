//! In-memory fetcher
//!
//! Serves preloaded series keyed by variable name and records every window
//! it was asked for. Suitable for tests and offline runs.

use super::Fetcher;
use crate::error::{Result, RuntimeError};
use caus_core::{TimeSeries, TimeWindow, VariableDefinition};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory recording fetcher
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    series: HashMap<String, TimeSeries>,

    /// Windows seen so far, in call order
    calls: Mutex<Vec<TimeWindow>>,

    /// Fail every fetch with this message
    failure: Option<String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload the series returned for `variable`
    pub fn with_series(mut self, variable: impl Into<String>, series: TimeSeries) -> Self {
        self.series.insert(variable.into(), series);
        self
    }

    /// Make every fetch fail
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of fetches served
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    /// Most recent window requested
    pub fn last_window(&self) -> Option<TimeWindow> {
        match self.calls.lock() {
            Ok(calls) => calls.last().copied(),
            Err(poisoned) => poisoned.into_inner().last().copied(),
        }
    }

    fn record(&self, window: &TimeWindow) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(*window),
            Err(poisoned) => poisoned.into_inner().push(*window),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        self.record(window);

        if let Some(message) = &self.failure {
            return Err(RuntimeError::backend("memory", message));
        }

        let series: TimeSeries = self
            .series
            .get(&variable.name)
            .map(|all| {
                all.iter()
                    .filter(|(t, _)| window.contains(**t))
                    .map(|(t, v)| (*t, *v))
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(
            "Memory fetcher served {} points for '{}'",
            series.len(),
            variable.name
        );
        Ok(series)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
