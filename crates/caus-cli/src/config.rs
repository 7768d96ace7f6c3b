//! CLI configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings read from `config/caus.*` and `CAUS_*` variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Causal engine gRPC address
    pub engine_address: String,

    /// Per-call engine timeout in seconds
    pub engine_timeout_secs: u64,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            engine_address: "http://localhost:50051".to_string(),
            engine_timeout_secs: 120,
            log_level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from `.env`, the config file and the environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/caus").required(false))
            .add_source(config::Environment::with_prefix("CAUS"));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}
