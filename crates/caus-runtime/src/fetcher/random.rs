//! Synthetic random series
//!
//! Fills every grid point with a uniform value in `[0, 100)`. The location
//! may carry a seed (`seed=42` or just `42`) for reproducible runs; the
//! seed is mixed with the variable name so two variables sharing one
//! fetcher still differ.

use super::Fetcher;
use crate::error::Result;
use caus_core::{TimeSeries, TimeWindow, VariableDefinition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random data fetcher
#[derive(Debug, Clone, Default)]
pub struct RandomFetcher {
    seed: Option<u64>,
}

impl RandomFetcher {
    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Read an optional seed from a source location
    pub fn from_location(location: &str) -> Self {
        let raw = location.trim();
        let raw = raw.strip_prefix("seed=").unwrap_or(raw);
        Self {
            seed: raw.parse().ok(),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn rng_for(&self, variable: &str) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ fnv1a(variable)),
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for RandomFetcher {
    async fn fetch(&self, variable: &VariableDefinition, window: &TimeWindow) -> Result<TimeSeries> {
        let mut rng = self.rng_for(&variable.name);
        let series = window
            .timestamps()
            .map(|t| (t, rng.gen_range(0.0..100.0)))
            .collect();
        Ok(series)
    }

    fn name(&self) -> &str {
        "random"
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x100000001b3)
    })
}
