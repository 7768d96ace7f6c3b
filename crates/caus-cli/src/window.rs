//! Time window arguments
//!
//! A window is either relative (`--start 1h --end 0s`, look-backs from now)
//! or absolute (`--from`/`--to` in RFC 3339).

use anyhow::{bail, Context, Result};
use caus_core::TimeWindow;
use chrono::{DateTime, TimeDelta, Utc};
use clap::Args;
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// Look-back to the window start (e.g. 1h, 30m, 7d)
    #[arg(long, default_value = "1h")]
    pub start: String,

    /// Look-back to the window end
    #[arg(long, default_value = "0s")]
    pub end: String,

    /// Absolute window start (RFC 3339); overrides --start
    #[arg(long, requires = "to")]
    pub from: Option<String>,

    /// Absolute window end (RFC 3339); overrides --end
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Grid step (e.g. 1m, 30s)
    #[arg(long, default_value = "1m")]
    pub step: String,
}

impl WindowArgs {
    /// Resolve against `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeWindow> {
        let step = parse_duration(&self.step).context("invalid --step")?;

        let (start, end) = match (&self.from, &self.to) {
            (Some(from), Some(to)) => (
                parse_timestamp(from).context("invalid --from")?,
                parse_timestamp(to).context("invalid --to")?,
            ),
            _ => (
                now - lookback(&self.start).context("invalid --start")?,
                now - lookback(&self.end).context("invalid --end")?,
            ),
        };

        Ok(TimeWindow::aligned(start, end, step)?)
    }
}

/// Parse `<n><unit>` with unit one of `s`, `m`, `h`, `d`, `w`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.len() < 2 {
        bail!("duration '{}' must look like 30s, 5m, 1h, 7d or 2w", s);
    }

    let (value_str, unit_str) = s.split_at(s.len() - 1);
    let value: u64 = value_str
        .parse()
        .with_context(|| format!("invalid number in duration '{}'", s))?;

    let seconds = match unit_str {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        _ => bail!("unknown duration unit '{}' in '{}'", unit_str, s),
    };

    value
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .with_context(|| format!("duration '{}' is too large", s))
}

fn lookback(s: &str) -> Result<TimeDelta> {
    let duration = parse_duration(s)?;
    TimeDelta::from_std(duration).with_context(|| format!("duration '{}' is out of range", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s.trim())
        .with_context(|| format!("'{}' is not an RFC 3339 timestamp", s))?;
    Ok(parsed.with_timezone(&Utc))
}
