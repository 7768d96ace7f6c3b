//! Time windows and sparse time series
//!
//! All timestamps are UTC and sit on a step grid anchored at the Unix epoch.

use crate::error::{CoreError, Result};
use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Sparse mapping from grid timestamp to value
///
/// Keys need not be contiguous; gaps are meaningful.
pub type TimeSeries = BTreeMap<DateTime<Utc>, f64>;

/// A normalized `[start, end]` window stepped by `step`
///
/// Both boundaries are truncated to UTC and to the step grid on
/// construction, so `10:00:47` with a one-minute step becomes `10:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl TimeWindow {
    /// Build a window, truncating both boundaries to the step grid
    pub fn aligned<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>, step: Duration) -> Result<Self> {
        if step < Duration::from_secs(1) {
            return Err(CoreError::InvalidWindow(format!(
                "step must be at least one second, got {:?}",
                step
            )));
        }

        let step = TimeDelta::from_std(step)
            .map_err(|e| CoreError::InvalidWindow(format!("step out of range: {}", e)))?;

        let start = truncate(start.with_timezone(&Utc), step)?;
        let end = truncate(end.with_timezone(&Utc), step)?;

        if start > end {
            return Err(CoreError::InvalidWindow(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }

        Ok(Self { start, end, step })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    /// Step in whole seconds
    pub fn step_seconds(&self) -> i64 {
        self.step.num_seconds()
    }

    /// Number of grid points, `floor((end - start) / step) + 1`
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        (span / self.step.num_milliseconds()) as usize + 1
    }

    /// A window always holds at least its start point
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Grid timestamps in ascending order, `end` included
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        std::iter::successors(Some(self.start), move |t| {
            let next = *t + self.step;
            (next <= self.end).then_some(next)
        })
    }

    /// Truncate `t` onto the grid; `None` if it falls outside the window
    pub fn align(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let t = truncate(t, self.step).ok()?;
        (t >= self.start && t <= self.end).then_some(t)
    }

    /// Whether `t` is exactly a grid point of this window
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.align(t) == Some(t)
    }
}

fn truncate(t: DateTime<Utc>, step: TimeDelta) -> Result<DateTime<Utc>> {
    t.duration_trunc(step)
        .map_err(|e| CoreError::InvalidWindow(format!("cannot truncate {}: {}", t.to_rfc3339(), e)))
}
