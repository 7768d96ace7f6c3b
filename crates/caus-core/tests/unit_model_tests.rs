//! Unit tests for the caus data model
//!
//! Variable documents, validation and fill policies, and the time grid

use caus_core::*;
use chrono::{TimeZone, Utc};
use std::time::Duration;

// =============================================================================
// Variable Document Tests
// =============================================================================

#[test]
fn test_variable_list_from_yaml() -> anyhow::Result<()> {
    let yaml = r#"
- name: checkout_errors
  source:
    type: traces
    impl: clickhouse
    loc: "http://localhost:8123"
  trace_query:
    service: checkout
    span_name: POST /orders
    dimension: calls
    aggregation: rate_per_sec
    attribute_queries:
      - { key: error, value: "true", operator: equals }
      - { key: http.route, value: orders, operator: contains }
- name: queue_depth
  source:
    type: metrics
    impl: prometheus
    loc: "http://localhost:9090"
  metrics_query: sum(queue_depth)
"#;

    let variables: Vec<VariableDefinition> = serde_yaml::from_str(yaml)?;
    ValidationPolicy::standard().validate_all(&variables)?;

    let query = variables[0].trace_query.as_ref().unwrap();
    assert_eq!(query.effective_aggregation(), Aggregation::RatePerSec);
    assert!(query.attribute_queries[0].is_error_flag());
    assert!(!query.attribute_queries[1].is_error_flag());
    assert_eq!(variables[1].dimension(), None);
    Ok(())
}

#[test]
fn test_payload_must_match_kind() {
    let mut variable = VariableDefinition::metrics(
        "cpu",
        Source::new(SourceKind::Metrics, "prometheus", "http://localhost:9090"),
        "up",
    );
    variable.trace_query = Some(TraceQuery::new("api", Dimension::Calls));

    let err = ValidationPolicy::standard()
        .validate_all(&[variable])
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidVariable { .. }));
}

// =============================================================================
// Fill Policy Tests
// =============================================================================

#[test]
fn test_rate_per_sec_zero_fills_through_calls() {
    let rate = VariableDefinition::traces(
        "rps",
        Source::new(SourceKind::Traces, "clickhouse", "http://localhost:8123"),
        TraceQuery::new("api", Dimension::Calls).with_aggregation(Aggregation::RatePerSec),
    );
    assert_eq!(FillPolicy::standard().gap_fill(&rate), GapFill::Zero);
}

// =============================================================================
// Time Grid Tests
// =============================================================================

#[test]
fn test_row_count_matches_grid_formula() {
    let start = Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap();
    for (minutes, step_secs) in [(0i64, 60u64), (59, 60), (60, 300), (61, 300), (1440, 3600)] {
        let end = start + chrono::TimeDelta::minutes(minutes);
        let window = TimeWindow::aligned(start, end, Duration::from_secs(step_secs)).unwrap();

        let expected = (minutes * 60 / step_secs as i64) as usize + 1;
        assert_eq!(window.len(), expected, "{minutes}m at {step_secs}s");
        assert_eq!(window.timestamps().count(), expected);
        assert!(window.timestamps().all(|t| window.contains(t)));
    }
}
