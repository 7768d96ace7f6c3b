//! Canonical aligned table
//!
//! Wire format: a header row of variable names in declared order, then one
//! row per grid timestamp in ascending order. Every cell is a decimal with
//! exactly six fraction digits. Timestamps are implicit and recovered from
//! the window on decode.

use crate::error::{Result, RuntimeError};
use caus_core::TimeWindow;
use chrono::{DateTime, Utc};

/// Dense time x variable grid
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    columns: Vec<String>,
    timestamps: Vec<DateTime<Utc>>,
    rows: Vec<Vec<f64>>,
}

/// Render one cell
pub fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}

/// The value a cell holds once rendered, so that decoding an encoded
/// table gives back the same grid
pub fn round_value(value: f64) -> f64 {
    format_value(value).parse().unwrap_or(value)
}

impl AlignedTable {
    /// Build a table, checking that the grid is rectangular
    ///
    /// Cells are stored at wire precision.
    pub fn new(
        columns: Vec<String>,
        timestamps: Vec<DateTime<Utc>>,
        mut rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if timestamps.len() != rows.len() {
            return Err(RuntimeError::Encoding(format!(
                "{} timestamps but {} rows",
                timestamps.len(),
                rows.len()
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(RuntimeError::Encoding(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        for cell in rows.iter_mut().flatten() {
            *cell = round_value(*cell);
        }
        Ok(Self {
            columns,
            timestamps,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Value at `(timestamp, column)`
    pub fn value(&self, t: DateTime<Utc>, name: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == name)?;
        let row = self.timestamps.binary_search(&t).ok()?;
        Some(self.rows[row][col])
    }

    /// Encode as canonical CSV bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        writer
            .write_record(&self.columns)
            .map_err(|e| RuntimeError::Encoding(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|v| format_value(*v)))
                .map_err(|e| RuntimeError::Encoding(e.to_string()))?;
        }

        writer
            .into_inner()
            .map_err(|e| RuntimeError::Encoding(e.to_string()))
    }

    /// Encode as a canonical CSV string
    pub fn to_csv_string(&self) -> Result<String> {
        String::from_utf8(self.encode()?).map_err(|e| RuntimeError::Encoding(e.to_string()))
    }

    /// Decode canonical CSV produced over `window`
    pub fn decode(bytes: &[u8], window: &TimeWindow) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| RuntimeError::Decoding(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| RuntimeError::Decoding(e.to_string()))?;
            let row = record
                .iter()
                .map(|cell| {
                    cell.parse::<f64>().map_err(|_| {
                        RuntimeError::Decoding(format!("row {}: invalid cell '{}'", i, cell))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        if rows.len() != window.len() {
            return Err(RuntimeError::Decoding(format!(
                "expected {} rows for the window, found {}",
                window.len(),
                rows.len()
            )));
        }

        Self::new(columns, window.timestamps().collect(), rows)
            .map_err(|e| RuntimeError::Decoding(e.to_string()))
    }
}
