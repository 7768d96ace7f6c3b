//! Validation and gap-fill policies
//!
//! Both policies are plain immutable values. Callers construct the one they
//! need and pass it in, so several policies can coexist in one process.

use crate::error::{CoreError, Result};
use crate::variable::{Aggregation, AttributeOperator, Dimension, TraceQuery, VariableDefinition};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Which dimensions, aggregations and attribute operators are accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    aggregations: BTreeMap<Dimension, BTreeSet<Aggregation>>,
    operators: BTreeSet<AttributeOperator>,
}

impl ValidationPolicy {
    pub fn new(
        aggregations: BTreeMap<Dimension, BTreeSet<Aggregation>>,
        operators: BTreeSet<AttributeOperator>,
    ) -> Self {
        Self {
            aggregations,
            operators,
        }
    }

    /// calls: count, rate_per_sec; duration: avg, p50, p95, p99;
    /// operators: equals, contains, isnotnull
    pub fn standard() -> Self {
        let mut aggregations = BTreeMap::new();
        aggregations.insert(
            Dimension::Calls,
            [Aggregation::Count, Aggregation::RatePerSec].into_iter().collect(),
        );
        aggregations.insert(
            Dimension::Duration,
            [
                Aggregation::Avg,
                Aggregation::P50,
                Aggregation::P95,
                Aggregation::P99,
            ]
            .into_iter()
            .collect(),
        );

        let operators = [
            AttributeOperator::Equals,
            AttributeOperator::Contains,
            AttributeOperator::IsNotNull,
        ]
        .into_iter()
        .collect();

        Self::new(aggregations, operators)
    }

    pub fn supports_dimension(&self, dimension: Dimension) -> bool {
        self.aggregations.contains_key(&dimension)
    }

    pub fn allowed_aggregations(&self, dimension: Dimension) -> Option<&BTreeSet<Aggregation>> {
        self.aggregations.get(&dimension)
    }

    pub fn supports_operator(&self, operator: AttributeOperator) -> bool {
        self.operators.contains(&operator)
    }

    /// Check one trace query
    pub fn check_trace_query(&self, variable: &str, query: &TraceQuery) -> Result<()> {
        if query.service.trim().is_empty() {
            return Err(CoreError::invalid_variable(variable, "service name is required"));
        }

        let allowed = self.allowed_aggregations(query.dimension).ok_or_else(|| {
            CoreError::invalid_variable(
                variable,
                format!(
                    "unsupported dimension '{}'. Supported: {}",
                    query.dimension,
                    join(self.aggregations.keys().map(|d| d.as_str()))
                ),
            )
        })?;

        if let Some(aggregation) = query.aggregation {
            if !allowed.contains(&aggregation) {
                return Err(CoreError::invalid_variable(
                    variable,
                    format!(
                        "unsupported aggregation '{}' for dimension '{}'. Supported: {}",
                        aggregation,
                        query.dimension,
                        join(allowed.iter().map(|a| a.as_str()))
                    ),
                ));
            }
        }

        for attribute in &query.attribute_queries {
            if attribute.key.trim().is_empty() {
                return Err(CoreError::invalid_variable(
                    variable,
                    "attribute query key is required",
                ));
            }
            if !self.supports_operator(attribute.operator) {
                return Err(CoreError::invalid_variable(
                    variable,
                    format!(
                        "unsupported operator '{}'. Supported: {}",
                        attribute.operator,
                        join(self.operators.iter().map(|o| o.as_str()))
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Validate a whole variable list, including name uniqueness
    pub fn validate_all(&self, variables: &[VariableDefinition]) -> Result<()> {
        let mut seen = HashSet::new();
        for variable in variables {
            variable.validate(self)?;
            if !seen.insert(variable.name.as_str()) {
                return Err(CoreError::DuplicateVariable(variable.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Gap-fill rule for a timestamp with no observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFill {
    /// Absence means no events happened
    Zero,

    /// Carry the last known value forward
    Forward,
}

/// Per-dimension gap-fill policy
///
/// Only trace dimensions listed here zero-fill. Metrics variables and all
/// other trace dimensions forward-fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPolicy {
    zero_fill: BTreeSet<Dimension>,
}

impl FillPolicy {
    pub fn new(zero_fill: impl IntoIterator<Item = Dimension>) -> Self {
        Self {
            zero_fill: zero_fill.into_iter().collect(),
        }
    }

    /// Zero-fill `calls`, forward-fill everything else
    pub fn standard() -> Self {
        Self::new([Dimension::Calls])
    }

    /// Forward-fill every variable
    pub fn forward_only() -> Self {
        Self::new([])
    }

    pub fn zero_fills(&self, dimension: Dimension) -> bool {
        self.zero_fill.contains(&dimension)
    }

    /// Rule for one variable
    pub fn gap_fill(&self, variable: &VariableDefinition) -> GapFill {
        match variable.dimension() {
            Some(dimension) if self.zero_fills(dimension) => GapFill::Zero,
            _ => GapFill::Forward,
        }
    }
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{AttributeQuery, Source, SourceKind};

    fn trace_var(name: &str, query: TraceQuery) -> VariableDefinition {
        VariableDefinition::traces(
            name,
            Source::new(SourceKind::Traces, "clickhouse", "http://localhost:8123"),
            query,
        )
    }

    fn metrics_var(name: &str) -> VariableDefinition {
        VariableDefinition::metrics(
            name,
            Source::new(SourceKind::Metrics, "prometheus", "http://localhost:9090"),
            "up",
        )
    }

    #[test]
    fn test_standard_policy_tables() {
        let policy = ValidationPolicy::standard();
        assert!(policy.supports_dimension(Dimension::Calls));
        assert!(policy.supports_dimension(Dimension::Duration));

        let calls = policy.allowed_aggregations(Dimension::Calls).unwrap();
        assert!(calls.contains(&Aggregation::Count));
        assert!(calls.contains(&Aggregation::RatePerSec));
        assert!(!calls.contains(&Aggregation::P99));

        assert!(policy.supports_operator(AttributeOperator::IsNotNull));
    }

    #[test]
    fn test_restricted_policy_coexists_with_standard() {
        let mut aggregations = BTreeMap::new();
        aggregations.insert(
            Dimension::Duration,
            [Aggregation::Avg].into_iter().collect::<BTreeSet<_>>(),
        );
        let strict = ValidationPolicy::new(
            aggregations,
            [AttributeOperator::Equals].into_iter().collect(),
        );

        let p99 = trace_var(
            "latency",
            TraceQuery::new("api", Dimension::Duration).with_aggregation(Aggregation::P99),
        );
        assert!(strict.validate_all(std::slice::from_ref(&p99)).is_err());
        assert!(ValidationPolicy::standard()
            .validate_all(std::slice::from_ref(&p99))
            .is_ok());

        let calls = trace_var("calls", TraceQuery::new("api", Dimension::Calls));
        let err = strict.validate_all(&[calls]).unwrap_err();
        assert!(err.to_string().contains("unsupported dimension 'calls'"));

        let contains = trace_var(
            "checkout",
            TraceQuery::new("api", Dimension::Duration).with_attribute(AttributeQuery::new(
                "http.route",
                AttributeOperator::Contains,
                "checkout",
            )),
        );
        let err = strict.validate_all(&[contains]).unwrap_err();
        assert!(err.to_string().contains("unsupported operator 'contains'"));
    }

    #[test]
    fn test_service_required() {
        let v = trace_var("calls", TraceQuery::new("", Dimension::Calls));
        let err = ValidationPolicy::standard().validate_all(&[v]).unwrap_err();
        assert!(err.to_string().contains("service name is required"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ValidationPolicy::standard()
            .validate_all(&[metrics_var("cpu"), metrics_var("cpu")])
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateVariable("cpu".to_string()));
    }

    #[test]
    fn test_standard_fill_policy() {
        let policy = FillPolicy::standard();
        let calls = trace_var("calls", TraceQuery::new("api", Dimension::Calls));
        let latency = trace_var("latency", TraceQuery::new("api", Dimension::Duration));

        assert_eq!(policy.gap_fill(&calls), GapFill::Zero);
        assert_eq!(policy.gap_fill(&latency), GapFill::Forward);
        assert_eq!(policy.gap_fill(&metrics_var("cpu")), GapFill::Forward);
    }

    #[test]
    fn test_forward_only_fill_policy() {
        let policy = FillPolicy::forward_only();
        let calls = trace_var("calls", TraceQuery::new("api", Dimension::Calls));
        assert_eq!(policy.gap_fill(&calls), GapFill::Forward);
    }
}
