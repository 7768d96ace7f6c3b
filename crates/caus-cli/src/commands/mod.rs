pub mod discover;
pub mod estimate;
pub mod simulate;

use crate::config::CliConfig;
use crate::window::WindowArgs;
use anyhow::{Context, Result};
use caus_core::{CausalGraph, TimeWindow, VariableDefinition};
use caus_sdk::{CausalService, GrpcEngine, VariableConfig};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a subcommand needs before talking to the engine
pub struct Session {
    pub service: CausalService,
    pub variables: Vec<VariableDefinition>,
    pub window: TimeWindow,
}

impl Session {
    /// Load variables, resolve the window and connect the engine lazily
    pub fn open(config: &CliConfig, vars_path: &Path, window: &WindowArgs) -> Result<Self> {
        let window = window.resolve(Utc::now())?;

        let engine = GrpcEngine::connect_lazy(config.engine_address.clone())?
            .with_timeout(config.engine_timeout());
        let service = CausalService::builder()
            .with_engine(Arc::new(engine))
            .build();

        let variables = VariableConfig::load(vars_path, service.validation_policy())
            .with_context(|| format!("Failed to load variables: {}", vars_path.display()))?
            .variables;

        info!(
            "Window {} .. {} step {}s ({} points), engine {}",
            window.start().to_rfc3339(),
            window.end().to_rfc3339(),
            window.step_seconds(),
            window.len(),
            config.engine_address
        );

        Ok(Self {
            service,
            variables,
            window,
        })
    }
}

/// Read a graph written by `discover --json`
pub fn load_graph(path: &Path) -> Result<CausalGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph: {}", path.display()))?;
    CausalGraph::from_json(&content)
        .with_context(|| format!("Failed to parse graph: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(
            &path,
            r#"{"nodes":[{"id":0,"label":"a"},{"id":1,"label":"b"}],"edges":[{"source":"a","target":"b","type":"directed","lag":1}]}"#,
        )
        .unwrap();

        let graph = load_graph(&path).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges[0].lag, 1);
    }

    #[test]
    fn test_load_graph_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nodes").unwrap();

        let err = load_graph(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
        assert!(load_graph(&dir.path().join("missing.json")).is_err());
    }
}
