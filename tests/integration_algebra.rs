//! Integration tests for temporal algebra against a file-backed metadata store
//!
//! These tests drive the public API end to end: datasets are created and
//! filled in an SQLite file, statements are evaluated with a recording
//! backend, and the results are checked after reopening the store.

use std::path::Path;
use tempfile::TempDir;
use tgis::app::adapters::backend::RecordingBackend;
use tgis::app::adapters::map_registry::PermissiveMapRegistry;
use tgis::app::models::{
    AbsoluteTime, DatasetKind, MapEntry, SpaceTimeDataset, SpatialExtent, TemporalExtent,
    TemporalType, TimeInstant,
};
use tgis::app::services::algebra::{AlgebraOptions, EvaluationState, evaluate};
use tgis::{Error, TemporalDatabaseConnection};
use tokio_util::sync::CancellationToken;

fn month(name: &str, start: &str, end: &str) -> MapEntry {
    let start = TimeInstant::Absolute(AbsoluteTime::parse(start).expect("valid start"));
    let end = TimeInstant::Absolute(AbsoluteTime::parse(end).expect("valid end"));
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(start, end).expect("valid interval"),
        SpatialExtent::new_2d(60.0, 50.0, 10.0, 0.0),
    )
}

/// Store with monthly temperature (January to April 2001) and precipitation
/// (same months without March)
fn climate_store(path: &Path) -> TemporalDatabaseConnection {
    let mut store =
        TemporalDatabaseConnection::open(path, "PERMANENT").expect("Failed to create store");

    let temp = SpaceTimeDataset::new("temp@PERMANENT", DatasetKind::Strds, TemporalType::Absolute)
        .with_title("Monthly mean temperature");
    store.create_dataset(&temp, false).expect("create temp");
    store
        .register_maps(
            "temp@PERMANENT",
            &[
                month("t1", "2001-01-01", "2001-02-01"),
                month("t2", "2001-02-01", "2001-03-01"),
                month("t3", "2001-03-01", "2001-04-01"),
                month("t4", "2001-04-01", "2001-05-01"),
            ],
        )
        .expect("register temp maps");

    let prec = SpaceTimeDataset::new("prec@PERMANENT", DatasetKind::Strds, TemporalType::Absolute);
    store.create_dataset(&prec, false).expect("create prec");
    store
        .register_maps(
            "prec@PERMANENT",
            &[
                month("p1", "2001-01-01", "2001-02-01"),
                month("p2", "2001-02-01", "2001-03-01"),
                month("p4", "2001-04-01", "2001-05-01"),
            ],
        )
        .expect("register prec maps");
    store
}

/// Combine two datasets and read the result back from disk
///
/// Purpose: Validate parse, plan, execute and registration through a real store file
/// Benefit: Catches persistence problems that in-memory stores hide
#[tokio::test]
async fn test_statement_results_survive_reopening() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("tgis.db");
    let mut store = climate_store(&db_path);

    let backend = RecordingBackend::new();
    let report = evaluate(
        "wet = temp + prec",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("w").with_nprocs(2),
        &CancellationToken::new(),
    )
    .await
    .expect("evaluation succeeds");

    assert_eq!(report.state, EvaluationState::Completed);
    assert_eq!(report.planned_slots, 3);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 2);

    let mut statements: Vec<String> = backend.requests().iter().map(|r| r.statement()).collect();
    statements.sort();
    assert_eq!(
        statements,
        vec![
            "w_0 = t1@PERMANENT + p1@PERMANENT",
            "w_1 = t2@PERMANENT + p2@PERMANENT",
            "w_3 = t4@PERMANENT + p4@PERMANENT",
        ]
    );
    store.close().expect("close store");

    let store = TemporalDatabaseConnection::open(&db_path, "PERMANENT").expect("reopen store");
    let output = store.get_dataset("wet@PERMANENT").expect("output dataset exists");
    assert_eq!(output.aggregate.map_count, 3);
    assert_eq!(output.aggregate.granularity.as_deref(), Some("1 month"));
    assert_eq!(output.title, "wet = temp + prec");

    let maps = store.list_maps("wet@PERMANENT", None).expect("list outputs");
    let ids: Vec<&str> = maps.iter().map(|map| map.id.as_str()).collect();
    assert_eq!(ids, vec!["w_0@PERMANENT", "w_1@PERMANENT", "w_3@PERMANENT"]);
    assert_eq!(
        maps[2].extent.to_string(),
        "2001-04-01 00:00:00 - 2001-05-01 00:00:00"
    );
}

#[tokio::test]
async fn test_null_registration_fills_gaps() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut store = climate_store(&dir.path().join("tgis.db"));

    let backend = RecordingBackend::new();
    let report = evaluate(
        "filled = temp + prec",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("f").with_register_null(),
        &CancellationToken::new(),
    )
    .await
    .expect("evaluation succeeds");

    assert_eq!(report.registered.len(), 4);
    assert!(report.skipped.is_empty());
    let requests = backend.requests();
    assert!(
        requests
            .iter()
            .any(|request| request.statement() == "f_2 = t3@PERMANENT + null()")
    );
}

#[tokio::test]
async fn test_temporal_functions_and_neighbours() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut store = climate_store(&dir.path().join("tgis.db"));

    let backend = RecordingBackend::new();
    evaluate(
        "trend = (temp[1] - temp[-1]) / td(temp) + start_month(temp)",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("d"),
        &CancellationToken::new(),
    )
    .await
    .expect("evaluation succeeds");

    let statements: Vec<String> = backend.requests().iter().map(|r| r.statement()).collect();
    assert_eq!(
        statements,
        vec![
            "d_1 = (t3@PERMANENT - t1@PERMANENT) / 28 + 2",
            "d_2 = (t4@PERMANENT - t2@PERMANENT) / 31 + 3",
        ]
    );
}

#[tokio::test]
async fn test_failed_run_and_dry_run_write_nothing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("tgis.db");
    let mut store = climate_store(&db_path);

    let backend = RecordingBackend::new().failing_on(["x_1"]);
    let result = evaluate(
        "X = temp * 2",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("x"),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, Err(Error::Backend { slot: 1, .. })));

    let dry = RecordingBackend::new();
    let report = evaluate(
        "Y = temp * 2",
        &mut store,
        &dry,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("y").with_dry_run(),
        &CancellationToken::new(),
    )
    .await
    .expect("dry run succeeds");
    assert_eq!(report.state, EvaluationState::Planned);
    assert_eq!(report.planned_slots, 4);
    assert!(dry.requests().is_empty());
    store.close().expect("close store");

    let store = TemporalDatabaseConnection::open(&db_path, "PERMANENT").expect("reopen store");
    assert!(store.find_dataset("X@PERMANENT").expect("lookup").is_none());
    assert!(store.find_dataset("Y@PERMANENT").expect("lookup").is_none());
    assert_eq!(store.list_datasets(None).expect("list").len(), 2);
}

#[tokio::test]
async fn test_statement_errors_are_reported_before_execution() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut store = climate_store(&dir.path().join("tgis.db"));
    let backend = RecordingBackend::new();

    let syntax = evaluate(
        "X = temp +",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("x"),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(syntax, Err(Error::Syntax { .. })));

    let unknown = evaluate(
        "X = temp + snow",
        &mut store,
        &backend,
        &PermissiveMapRegistry,
        &AlgebraOptions::new("x"),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(unknown, Err(Error::UnknownDataset { .. })));
    assert!(backend.requests().is_empty());
}
