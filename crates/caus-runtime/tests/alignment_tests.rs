//! Registry + pipeline integration tests over in-memory and file fetchers

use caus_core::{
    Dimension, Source, SourceKind, TimeSeries, TimeWindow, TraceQuery, VariableDefinition,
};
use caus_runtime::{
    AlignedTable, AlignmentPipeline, FactoryTable, Fetcher, FetcherRegistry, MemoryFetcher,
    RuntimeError,
};
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn t(m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 10, 1, 10, m, s).unwrap()
}

fn memory_metric(name: &str) -> VariableDefinition {
    VariableDefinition::metrics(
        name,
        Source::new(SourceKind::Metrics, "memory", "mem://local"),
        name,
    )
}

fn memory_calls(name: &str) -> VariableDefinition {
    VariableDefinition::traces(
        name,
        Source::new(SourceKind::Traces, "memory", "mem://local"),
        TraceQuery::new("frontend", Dimension::Calls),
    )
}

#[tokio::test]
async fn test_fetchers_receive_truncated_window() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let table = FactoryTable::new().with_fetcher(
        SourceKind::Metrics,
        "memory",
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
    );
    let variables = vec![memory_metric("cpu")];
    let registry = FetcherRegistry::build(table, &variables).await.unwrap();

    AlignmentPipeline::default()
        .run(
            &registry,
            &variables,
            t(0, 47),
            t(5, 12),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let seen = fetcher.last_window().unwrap();
    assert_eq!(seen.start(), t(0, 0));
    assert_eq!(seen.end(), t(5, 0));
}

#[tokio::test]
async fn test_mixed_fill_end_to_end() {
    let calls: TimeSeries = [(t(0, 0), 10.0), (t(2, 0), 5.0)].into_iter().collect();
    let cpu: TimeSeries = [(t(0, 0), 0.5), (t(2, 0), 0.9)].into_iter().collect();

    let metrics = Arc::new(MemoryFetcher::new().with_series("cpu", cpu));
    let traces = Arc::new(MemoryFetcher::new().with_series("front_calls", calls));
    let table = FactoryTable::new()
        .with_fetcher(SourceKind::Metrics, "memory", metrics)
        .with_fetcher(SourceKind::Traces, "memory", traces);

    let variables = vec![memory_calls("front_calls"), memory_metric("cpu")];
    let registry = FetcherRegistry::build(table, &variables).await.unwrap();
    assert_eq!(registry.len(), 2);

    let aligned = AlignmentPipeline::default()
        .run(&registry, &variables, t(0, 0), t(2, 0), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(
        aligned.to_csv_string().unwrap(),
        "front_calls,cpu\n10.000000,0.500000\n0.000000,0.500000\n5.000000,0.900000\n"
    );

    let window = TimeWindow::aligned(t(0, 0), t(2, 0), Duration::from_secs(60)).unwrap();
    let decoded = AlignedTable::decode(&aligned.encode().unwrap(), &window).unwrap();
    assert_eq!(decoded, aligned);
}

#[tokio::test]
async fn test_one_failing_variable_fails_the_run() {
    let table = FactoryTable::new()
        .with_fetcher(SourceKind::Metrics, "memory", Arc::new(MemoryFetcher::new()))
        .with_fetcher(
            SourceKind::Traces,
            "memory",
            Arc::new(MemoryFetcher::failing("backend down")),
        );
    let variables = vec![memory_metric("cpu"), memory_calls("front_calls")];
    let registry = FetcherRegistry::build(table, &variables).await.unwrap();

    let err = AlignmentPipeline::default()
        .run(&registry, &variables, t(0, 0), t(2, 0), Duration::from_secs(60))
        .await
        .unwrap_err();

    match &err {
        RuntimeError::VariableFetchFailed { variable, .. } => assert_eq!(variable, "front_calls"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root_cause(), RuntimeError::BackendQuery { .. }));
}

#[tokio::test]
async fn test_unsupported_implementation_keeps_resolved_fetchers() {
    let mut registry = FetcherRegistry::new(FactoryTable::standard());

    let first = VariableDefinition::metrics(
        "noise_a",
        Source::new(SourceKind::Metrics, "random", "seed=1"),
        "noise",
    );
    let second = VariableDefinition::metrics(
        "noise_b",
        Source::new(SourceKind::Metrics, "random", "seed=1"),
        "noise",
    );
    let third = VariableDefinition::metrics(
        "cpu",
        Source::new(SourceKind::Metrics, "graphite", "http://graphite"),
        "cpu",
    );

    let a = registry.resolve(&first).await.unwrap();
    let b = registry.resolve(&second).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let err = match registry.resolve(&third).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    };
    assert!(matches!(err, RuntimeError::UnsupportedImplementation { .. }));
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(SourceKind::Metrics, "random"));
}

#[tokio::test]
async fn test_csv_backed_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "front_calls,db_latency").unwrap();
    writeln!(file, "1,100").unwrap();
    writeln!(file, "2,110").unwrap();
    writeln!(file, "3,120").unwrap();
    let location = file.path().display().to_string();

    let variables = vec![
        VariableDefinition::metrics(
            "front_calls",
            Source::new(SourceKind::Metrics, "csv", location.clone()),
            "front_calls",
        ),
        VariableDefinition::metrics(
            "db_latency",
            Source::new(SourceKind::Metrics, "csv", location),
            "db_latency",
        ),
    ];
    let registry = FetcherRegistry::build(FactoryTable::standard(), &variables)
        .await
        .unwrap();
    assert_eq!(registry.len(), 1);

    let aligned = AlignmentPipeline::default()
        .run(&registry, &variables, t(0, 0), t(2, 0), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(aligned.row_count(), 3);
    assert_eq!(aligned.column("db_latency"), Some(vec![100.0, 110.0, 120.0]));
}
