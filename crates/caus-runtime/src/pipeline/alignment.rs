//! Alignment pipeline
//!
//! Scatter issues one concurrent fetch per variable. Gather walks the grid
//! in ascending time and the variables in declared order, filling gaps per
//! the [`FillPolicy`]. Forward-fill state starts at `0.0`, so a variable
//! whose first observation comes late reads `0.0` until then.

use super::table::AlignedTable;
use crate::error::{Result, RuntimeError};
use crate::registry::FetcherRegistry;
use caus_core::{FillPolicy, GapFill, TimeSeries, TimeWindow, VariableDefinition};
use chrono::{DateTime, Utc};
use futures::future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Scatter/gather pipeline
#[derive(Debug, Clone, Default)]
pub struct AlignmentPipeline {
    fill_policy: FillPolicy,
}

impl AlignmentPipeline {
    pub fn new(fill_policy: FillPolicy) -> Self {
        Self { fill_policy }
    }

    pub fn fill_policy(&self) -> &FillPolicy {
        &self.fill_policy
    }

    /// Normalize the window, then fetch and stitch
    pub async fn run(
        &self,
        registry: &FetcherRegistry,
        variables: &[VariableDefinition],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<AlignedTable> {
        let window = TimeWindow::aligned(start, end, step)?;
        self.run_window(registry, variables, &window).await
    }

    /// Fetch and stitch over an already normalized window
    pub async fn run_window(
        &self,
        registry: &FetcherRegistry,
        variables: &[VariableDefinition],
        window: &TimeWindow,
    ) -> Result<AlignedTable> {
        let started = Instant::now();
        let series = self.scatter(registry, variables, window).await?;
        let table = self.stitch(variables, &series, window)?;

        info!(
            "Aligned {} variable(s) over {} step(s) in {:?}",
            variables.len(),
            table.row_count(),
            started.elapsed()
        );
        Ok(table)
    }

    /// Fetch every variable concurrently; the first failure aborts the run
    pub async fn scatter(
        &self,
        registry: &FetcherRegistry,
        variables: &[VariableDefinition],
        window: &TimeWindow,
    ) -> Result<Vec<TimeSeries>> {
        let fetches = variables.iter().map(|variable| async move {
            let fetched = async {
                let fetcher = registry.get(variable.kind(), &variable.source.implementation)?;
                fetcher.fetch(variable, window).await
            }
            .await;

            match fetched {
                Ok(series) => {
                    debug!("Fetched {} point(s) for '{}'", series.len(), variable.name);
                    Ok(series)
                }
                Err(cause) => Err(RuntimeError::VariableFetchFailed {
                    variable: variable.name.clone(),
                    cause: Box::new(cause),
                }),
            }
        });

        future::try_join_all(fetches).await
    }

    /// Sequential gap-filling pass over the grid
    pub fn stitch(
        &self,
        variables: &[VariableDefinition],
        series: &[TimeSeries],
        window: &TimeWindow,
    ) -> Result<AlignedTable> {
        if variables.len() != series.len() {
            return Err(RuntimeError::Encoding(format!(
                "{} variables but {} series",
                variables.len(),
                series.len()
            )));
        }

        let fills: Vec<GapFill> = variables
            .iter()
            .map(|v| self.fill_policy.gap_fill(v))
            .collect();
        let mut last_known = vec![0.0_f64; variables.len()];

        let timestamps: Vec<DateTime<Utc>> = window.timestamps().collect();
        let mut rows = Vec::with_capacity(timestamps.len());

        for t in &timestamps {
            let mut row = Vec::with_capacity(variables.len());
            for (i, observed) in series.iter().enumerate() {
                let value = match observed.get(t) {
                    Some(v) => {
                        last_known[i] = *v;
                        *v
                    }
                    None => {
                        if fills[i] == GapFill::Zero {
                            last_known[i] = 0.0;
                        }
                        last_known[i]
                    }
                };
                row.push(value);
            }
            rows.push(row);
        }

        let columns = variables.iter().map(|v| v.name.clone()).collect();
        AlignedTable::new(columns, timestamps, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caus_core::{Dimension, Source, SourceKind, TraceQuery};
    use chrono::TimeZone;

    fn t(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 1, 10, m, 0).unwrap()
    }

    fn window(last: u32) -> TimeWindow {
        TimeWindow::aligned(t(0), t(last), Duration::from_secs(60)).unwrap()
    }

    fn calls(name: &str) -> VariableDefinition {
        VariableDefinition::traces(
            name,
            Source::new(SourceKind::Traces, "memory", ""),
            TraceQuery::new("frontend", Dimension::Calls),
        )
    }

    fn latency(name: &str) -> VariableDefinition {
        VariableDefinition::traces(
            name,
            Source::new(SourceKind::Traces, "memory", ""),
            TraceQuery::new("db", Dimension::Duration),
        )
    }

    fn series(points: &[(u32, f64)]) -> TimeSeries {
        points.iter().map(|(m, v)| (t(*m), *v)).collect()
    }

    #[test]
    fn test_calls_zero_fill_and_duration_forward_fill() {
        let pipeline = AlignmentPipeline::default();
        let table = pipeline
            .stitch(
                &[calls("C"), latency("L")],
                &[
                    series(&[(0, 10.0), (2, 5.0)]),
                    series(&[(0, 100.0)]),
                ],
                &window(2),
            )
            .unwrap();

        assert_eq!(table.column("C"), Some(vec![10.0, 0.0, 5.0]));
        assert_eq!(table.column("L"), Some(vec![100.0, 100.0, 100.0]));
    }

    #[test]
    fn test_forward_fill_starts_at_zero() {
        let pipeline = AlignmentPipeline::default();
        let table = pipeline
            .stitch(&[latency("L")], &[series(&[(2, 7.0)])], &window(3))
            .unwrap();
        assert_eq!(table.column("L"), Some(vec![0.0, 0.0, 7.0, 7.0]));
    }

    #[test]
    fn test_forward_only_policy_carries_calls() {
        let pipeline = AlignmentPipeline::new(FillPolicy::forward_only());
        let table = pipeline
            .stitch(&[calls("C")], &[series(&[(0, 3.0)])], &window(2))
            .unwrap();
        assert_eq!(table.column("C"), Some(vec![3.0, 3.0, 3.0]));
    }

    #[test]
    fn test_cells_held_at_wire_precision() {
        let table = AlignmentPipeline::default()
            .stitch(&[latency("L")], &[series(&[(0, 2.0 / 3.0)])], &window(1))
            .unwrap();
        assert_eq!(table.column("L"), Some(vec![0.666667, 0.666667]));
    }

    #[test]
    fn test_zero_fill_resets_running_value() {
        let pipeline = AlignmentPipeline::default();
        let table = pipeline
            .stitch(&[calls("C")], &[series(&[(0, 4.0), (2, 6.0)])], &window(3))
            .unwrap();
        assert_eq!(table.column("C"), Some(vec![4.0, 0.0, 6.0, 0.0]));
    }

    #[test]
    fn test_off_grid_points_ignored() {
        let mut off = TimeSeries::new();
        off.insert(t(0) + chrono::TimeDelta::seconds(30), 99.0);
        let table = AlignmentPipeline::default()
            .stitch(&[latency("L")], &[off], &window(1))
            .unwrap();
        assert_eq!(table.column("L"), Some(vec![0.0, 0.0]));
    }

    #[test]
    fn test_row_count_matches_window() {
        let table = AlignmentPipeline::default()
            .stitch(&[calls("C")], &[TimeSeries::new()], &window(9))
            .unwrap();
        assert_eq!(table.row_count(), 10);
        assert!(table.rows().iter().all(|r| r.len() == 1));
    }
}
