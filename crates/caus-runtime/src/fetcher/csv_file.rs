//! Flat-file fetcher
//!
//! Reads a headered CSV file and takes the column named after the variable.
//! Rows carry no timestamps: the last parseable row is pinned to the window
//! end and each earlier parseable row sits one step further back, down to
//! the window start.

use super::{connection_error, Fetcher};
use crate::error::{Result, RuntimeError};
use caus_core::{Source, TimeSeries, TimeWindow, VariableDefinition};
use std::path::{Path, PathBuf};

/// CSV file fetcher
#[derive(Debug, Clone)]
pub struct CsvFetcher {
    path: PathBuf,
}

impl CsvFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build from a source whose location is the file path
    pub fn from_source(source: &Source) -> Result<Self> {
        if source.location.trim().is_empty() {
            return Err(connection_error(source, "csv source requires a file path"));
        }
        Ok(Self::new(source.location.trim()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait::async_trait]
impl Fetcher for CsvFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            RuntimeError::backend("csv", format!("failed to open {}: {}", self.location(), e))
        })?;

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(bytes.as_slice());

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| RuntimeError::backend("csv", format!("failed to read header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let column = header
            .iter()
            .position(|h| h == &variable.name)
            .ok_or_else(|| RuntimeError::ColumnNotFound {
                column: variable.name.clone(),
                location: self.location(),
                header: header.clone(),
            })?;

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RuntimeError::backend("csv", format!("failed to read rows: {}", e)))?;

        if records.is_empty() {
            return Err(RuntimeError::EmptyDataset {
                location: self.location(),
            });
        }

        // Rows without a parseable value are skipped and do not take a slot.
        let mut series = TimeSeries::new();
        let grid = window.timestamps().collect::<Vec<_>>();
        let mut slots = grid.iter().rev();
        for record in records.iter().rev() {
            let Some(value) = record.get(column).and_then(|cell| cell.parse::<f64>().ok()) else {
                continue;
            };
            let Some(t) = slots.next() else {
                break;
            };
            series.insert(*t, value);
        }

        tracing::debug!(
            "Read {} of {} rows for '{}' from {}",
            series.len(),
            records.len(),
            variable.name,
            self.location()
        );
        Ok(series)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
