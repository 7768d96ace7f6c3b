//! Variable configuration
//!
//! ```yaml
//! variables:
//!   - name: front_calls
//!     source: { type: traces, impl: clickhouse, loc: "http://localhost:8123" }
//!     trace_query: { service: frontend, dimension: calls }
//!   - name: cpu
//!     source: { type: metrics, impl: prometheus, loc: "http://localhost:9090" }
//!     metrics_query: avg(rate(cpu_seconds_total[1m]))
//! ```

use crate::error::{Result, SdkError};
use caus_core::{ValidationPolicy, VariableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed variables file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

impl VariableConfig {
    /// Parse YAML without validating
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SdkError::Config(format!("failed to parse variables: {}", e)))
    }

    /// Read, parse and validate a variables file
    pub fn load(path: impl AsRef<Path>, policy: &ValidationPolicy) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading variables from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            SdkError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        config.validate(policy)?;

        tracing::info!(
            "Loaded {} variable(s) from {}",
            config.variables.len(),
            path.display()
        );
        Ok(config)
    }

    /// Validate every definition; at least one is required
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<()> {
        if self.variables.is_empty() {
            return Err(SdkError::Config("no variables defined".to_string()));
        }
        policy.validate_all(&self.variables)?;
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caus_core::{CoreError, Dimension, SourceKind};
    use std::io::Write;

    const VARIABLES: &str = r#"
variables:
  - name: front_calls
    source:
      type: traces
      impl: clickhouse
      loc: "http://localhost:8123"
    trace_query:
      service: frontend
      span_kind: Server
      dimension: calls
  - name: db_latency
    source:
      type: traces
      impl: clickhouse
      loc: "http://localhost:8123"
    trace_query:
      service: db
      dimension: duration
      aggregation: p95
  - name: cpu
    source:
      type: metrics
      impl: datadog
      loc: "https://api.datadoghq.com"
      api_key: k
      app_key: a
    metrics_query: "avg:system.cpu.user{*}"
"#;

    #[test]
    fn test_parse_variables() {
        let config = VariableConfig::from_yaml(VARIABLES).unwrap();
        assert_eq!(
            config.names().collect::<Vec<_>>(),
            vec!["front_calls", "db_latency", "cpu"]
        );
        assert_eq!(config.variables[0].dimension(), Some(Dimension::Calls));
        assert_eq!(config.variables[2].kind(), SourceKind::Metrics);
        assert_eq!(config.variables[2].source.api_key.as_deref(), Some("k"));
        assert!(config.validate(&ValidationPolicy::standard()).is_ok());
    }

    #[test]
    fn test_load_validates_eagerly() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
variables:
  - name: calls
    source: {{ type: traces, impl: clickhouse, loc: "http://ch" }}
    trace_query: {{ service: api, dimension: calls, aggregation: p99 }}
"#
        )
        .unwrap();

        let err = VariableConfig::load(file.path(), &ValidationPolicy::standard()).unwrap_err();
        assert!(matches!(err, SdkError::Core(CoreError::InvalidVariable { .. })));
    }

    #[test]
    fn test_empty_config_rejected() {
        let config = VariableConfig::from_yaml("variables: []").unwrap();
        assert!(matches!(
            config.validate(&ValidationPolicy::standard()),
            Err(SdkError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = VariableConfig::load("/nonexistent/vars.yaml", &ValidationPolicy::standard())
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
