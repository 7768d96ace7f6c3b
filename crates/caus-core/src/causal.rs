//! Causal engine request and result types
//!
//! These are the values exchanged with the remote causal engine. The
//! pipeline passes results through or summarizes them; it never mutates
//! them.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: i32,

    pub label: String,
}

/// Directed, lagged edge `source --(lag)--> target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,

    pub target: String,

    #[serde(rename = "type", default)]
    pub edge_type: String,

    /// Lag in steps
    #[serde(default)]
    pub lag: i32,
}

/// Causal graph discovered by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CausalGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl CausalGraph {
    /// Parse a graph document as written by `discover --json`
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Edges pointing at `target`
    pub fn parents_of<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == target)
    }
}

/// Per-node linear structural model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,

    /// Feature names, e.g. `front_calls_lag1`
    pub features: Vec<String>,

    /// Coefficients, index-aligned with `features`
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// `(feature, coefficient)` pairs
    pub fn terms(&self) -> impl Iterator<Item = (&str, f64)> {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.coefficients.iter().copied())
    }
}

/// Estimation result keyed by node name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    #[serde(default)]
    pub models: BTreeMap<String, LinearModel>,
}

/// What an intervention does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionAction {
    /// Replace the target's value with `value`
    SetToFixed,

    /// Multiply the target by `1 + value`
    IncreaseByPercent,
}

impl InterventionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionAction::SetToFixed => "SET_TO_FIXED",
            InterventionAction::IncreaseByPercent => "INCREASE_BY_PERCENT",
        }
    }
}

impl fmt::Display for InterventionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A "what-if" directive for the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub target: String,
    pub action: InterventionAction,
    pub value: f64,
}

impl Intervention {
    /// Human readable description
    pub fn describe(&self) -> String {
        match self.action {
            InterventionAction::IncreaseByPercent => {
                format!("Scaling {} by {:.1}%", self.target, self.value * 100.0)
            }
            InterventionAction::SetToFixed => {
                format!("Setting {} to {:.2}", self.target, self.value)
            }
        }
    }
}

/// Discovery request
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverRequest {
    /// Canonical table
    pub table: String,

    /// Maximum lag in steps
    pub max_lag: i32,

    /// Significance level in (0, 1]
    pub significance_level: f32,
}

/// Estimation request
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    pub table: String,
    pub graph: CausalGraph,
}

/// Simulation request
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateRequest {
    pub table: String,
    pub graph: CausalGraph,
    pub intervention: Intervention,

    /// Number of simulated steps
    pub horizon: i32,
}

/// Raw JSON simulation output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub json: String,
}

impl SimulationResult {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    /// Decode the per-metric trace
    pub fn trace(&self) -> Result<SimulationTrace> {
        serde_json::from_str(&self.json).map_err(|e| CoreError::InvalidTrace(e.to_string()))
    }
}

/// Original and simulated series for one metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTrace {
    #[serde(default)]
    pub original: Vec<f64>,

    #[serde(default)]
    pub simulated: Vec<f64>,
}

/// Decoded simulation output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricTrace>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_json_round_trip() {
        let json = r#"{
            "nodes": [{"id": 0, "label": "front_calls"}, {"id": 1, "label": "db_latency"}],
            "edges": [{"source": "front_calls", "target": "db_latency", "type": "directed", "lag": 1}]
        }"#;

        let graph = CausalGraph::from_json(json).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges[0].edge_type, "directed");
        assert_eq!(graph.parents_of("db_latency").count(), 1);
        assert_eq!(graph.parents_of("front_calls").count(), 0);

        let written = graph.to_json_pretty().unwrap();
        assert_eq!(CausalGraph::from_json(&written).unwrap(), graph);
    }

    #[test]
    fn test_graph_missing_fields_default() {
        let graph = CausalGraph::from_json(r#"{"nodes": [{"label": "a"}]}"#).unwrap();
        assert_eq!(graph.nodes[0].id, 0);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_linear_model_terms() {
        let model = LinearModel {
            intercept: 1.5,
            features: vec!["a_lag0".to_string(), "b_lag1".to_string()],
            coefficients: vec![0.5, -2.0],
        };
        let terms: Vec<_> = model.terms().collect();
        assert_eq!(terms, vec![("a_lag0", 0.5), ("b_lag1", -2.0)]);
    }

    #[test]
    fn test_intervention_describe() {
        let scale = Intervention {
            target: "front_calls".to_string(),
            action: InterventionAction::IncreaseByPercent,
            value: 0.2,
        };
        assert_eq!(scale.describe(), "Scaling front_calls by 20.0%");

        let fixed = Intervention {
            target: "front_calls".to_string(),
            action: InterventionAction::SetToFixed,
            value: 500.0,
        };
        assert_eq!(fixed.describe(), "Setting front_calls to 500.00");
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&InterventionAction::IncreaseByPercent).unwrap();
        assert_eq!(json, "\"INCREASE_BY_PERCENT\"");
    }

    #[test]
    fn test_simulation_trace_decode() {
        let result = SimulationResult::new(
            r#"{"metrics": {"db_latency": {"original": [1.0, 2.0], "simulated": [1.5, 2.5]}}}"#,
        );
        let trace = result.trace().unwrap();
        assert_eq!(trace.metrics["db_latency"].simulated, vec![1.5, 2.5]);

        assert!(SimulationResult::new("not json").trace().is_err());
    }
}
