//! Effect reporting and text renderers
//!
//! [`EffectReport`] summarizes one variable of a simulation trace. The
//! `render_*` functions produce the text reports printed by the CLI.

use crate::error::{Result, SdkError};
use caus_core::{CausalGraph, EstimateResult, Intervention, SimulationResult, SimulationTrace};
use chrono::TimeDelta;
use std::fmt::{self, Write};

/// Baselines closer to zero than this are treated as zero
pub const ZERO_EPSILON: f64 = 1e-9;

/// Coefficients with a larger magnitude are flagged as strong
pub const STRONG_COEFFICIENT: f64 = 1.0;

const RULE: &str = "---------------------------------";

/// Relative change of the counterfactual against the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentChange {
    /// Percentage points
    Percent(f64),

    /// Baseline is zero but the counterfactual is not
    Undefined,
}

impl PercentChange {
    /// `delta / baseline * 100`, guarded against a near-zero baseline
    pub fn between(baseline: f64, delta: f64) -> Self {
        if baseline.abs() < ZERO_EPSILON {
            if delta.abs() < ZERO_EPSILON {
                PercentChange::Percent(0.0)
            } else {
                PercentChange::Undefined
            }
        } else {
            PercentChange::Percent(delta / baseline * 100.0)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PercentChange::Percent(p) => Some(*p),
            PercentChange::Undefined => None,
        }
    }
}

impl fmt::Display for PercentChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentChange::Percent(p) => write!(f, "{:.2}%", p),
            PercentChange::Undefined => f.write_str("N/A"),
        }
    }
}

/// Before/after summary for one effect variable
#[derive(Debug, Clone, PartialEq)]
pub struct EffectReport {
    pub effect: String,
    pub baseline: f64,
    pub counterfactual: f64,
    pub delta: f64,
    pub percent: PercentChange,
}

impl EffectReport {
    /// Summarize `effect` from the engine's raw JSON output
    pub fn from_result(result: &SimulationResult, effect: &str) -> Result<Self> {
        Self::from_trace(&result.trace()?, effect)
    }

    /// Summarize `effect` from a decoded simulation trace
    pub fn from_trace(trace: &SimulationTrace, effect: &str) -> Result<Self> {
        let metric = trace
            .metrics
            .get(effect)
            .ok_or_else(|| SdkError::EffectVariableNotFound(effect.to_string()))?;

        if metric.original.is_empty() || metric.simulated.is_empty() {
            return Err(SdkError::EmptyEffectSeries(effect.to_string()));
        }
        if metric.original.len() != metric.simulated.len() {
            return Err(SdkError::MismatchedEffectSeries {
                variable: effect.to_string(),
                original: metric.original.len(),
                simulated: metric.simulated.len(),
            });
        }

        let baseline = mean(&metric.original);
        let counterfactual = mean(&metric.simulated);
        let delta = counterfactual - baseline;

        Ok(Self {
            effect: effect.to_string(),
            baseline,
            counterfactual,
            delta,
            percent: PercentChange::between(baseline, delta),
        })
    }

    /// Signed delta with percentage, e.g. `+5.00 (50.00%)`
    pub fn net_impact(&self) -> String {
        let sign = if self.delta > 0.0 { "+" } else { "" };
        format!("{}{:.2} ({})", sign, self.delta, self.percent)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Simulation report for one intervention
pub fn render_simulation(intervention: &Intervention, report: &EffectReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n--- Simulation Report ---");
    let _ = writeln!(out, "Intervention: {}", intervention.describe());
    let _ = writeln!(out, "Effect:       {}", report.effect);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Baseline Average:     {:.2}", report.baseline);
    let _ = writeln!(out, "Counterfactual Avg:   {:.2}", report.counterfactual);
    let _ = writeln!(out, "Net Impact:           {}", report.net_impact());
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Graph report; lags are shown in steps and as wall-clock time
pub fn render_graph(graph: &CausalGraph, step: TimeDelta) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n--- Causal Graph Results ---");
    let _ = writeln!(out, "Nodes:");
    for node in &graph.nodes {
        let _ = writeln!(out, "  - {}", node.label);
    }

    let _ = writeln!(out, "\nDiscovered Edges:");
    if graph.edges.is_empty() {
        let _ = writeln!(out, "  No causal edges were found.");
    }
    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  - {} --> {} (lag: {} = {})",
            edge.source,
            edge.target,
            edge.lag,
            format_span(step * edge.lag)
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(28));
    out
}

/// Per-node coefficients, strong terms flagged
pub fn render_estimation(result: &EstimateResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n--- Causal Physics (Discovered Coefficients) ---");
    for (node, model) in &result.models {
        let _ = writeln!(out, "Node: {}", node);
        let _ = writeln!(out, "  Intercept: {:.4}", model.intercept);
        for (feature, coefficient) in model.terms() {
            let marker = if coefficient.abs() > STRONG_COEFFICIENT {
                " (STRONG)"
            } else {
                ""
            };
            let _ = writeln!(out, "  -> {}: {:.4}{}", feature, coefficient, marker);
        }
        let _ = writeln!(out);
    }
    out
}

/// `1h30m`, `5m`, `45s`
fn format_span(span: TimeDelta) -> String {
    let total = span.num_seconds();
    if total == 0 {
        return "0s".to_string();
    }

    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if hours != 0 {
        let _ = write!(out, "{}h", hours);
    }
    if minutes != 0 {
        let _ = write!(out, "{}m", minutes);
    }
    if seconds != 0 {
        let _ = write!(out, "{}s", seconds);
    }
    out
}
