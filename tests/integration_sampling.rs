//! Integration tests for temporal topology, granularity and sampling
//!
//! Datasets are stored in an SQLite file and read back as snapshots, the
//! way the CLI commands consume them.

use tempfile::TempDir;
use tgis::app::models::{
    AbsoluteTime, DatasetKind, MapEntry, SpaceTimeDataset, SpatialExtent, TemporalExtent,
    TemporalType, TimeInstant,
};
use tgis::app::services::granularity::{Granularity, combine_granularities};
use tgis::app::services::metadata_store::MapFilter;
use tgis::app::services::sampling::{MethodSet, sample, sample_by_dataset};
use tgis::app::services::topology::{Relation, build_relation_table, build_relation_table_naive};
use tgis::cli::commands::analysis::dataset_granularities;
use tgis::TemporalDatabaseConnection;

fn at(text: &str) -> TimeInstant {
    TimeInstant::Absolute(AbsoluteTime::parse(text).expect("valid time"))
}

fn map(name: &str, start: &str, end: &str) -> MapEntry {
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(at(start), at(end)).expect("valid interval"),
        SpatialExtent::new_2d(60.0, 50.0, 10.0, 0.0),
    )
}

fn add_dataset(store: &mut TemporalDatabaseConnection, name: &str, maps: &[MapEntry]) {
    let id = format!("{}@PERMANENT", name);
    let dataset = SpaceTimeDataset::new(id.clone(), DatasetKind::Strds, TemporalType::Absolute);
    store.create_dataset(&dataset, false).expect("create dataset");
    store.register_maps(&id, maps).expect("register maps");
}

fn seasonal_store(dir: &TempDir) -> TemporalDatabaseConnection {
    let mut store = TemporalDatabaseConnection::open(dir.path().join("tgis.db"), "PERMANENT")
        .expect("Failed to create store");
    add_dataset(
        &mut store,
        "temp",
        &[
            map("t1", "2001-01-01", "2001-02-01"),
            map("t2", "2001-02-01", "2001-03-01"),
            map("t3", "2001-03-01", "2001-04-01"),
            map("t4", "2001-04-01", "2001-05-01"),
        ],
    );
    add_dataset(&mut store, "season", &[map("winter", "2001-01-01", "2001-04-01")]);
    add_dataset(
        &mut store,
        "daily",
        &[
            map("d1", "2001-01-01", "2001-01-02"),
            map("d2", "2001-01-02", "2001-01-03"),
            map("d3", "2001-01-05", "2001-01-06"),
        ],
    );
    store
}

fn ids(maps: &[MapEntry]) -> Vec<&str> {
    maps.iter().map(|map| map.id.as_str()).collect()
}

/// Relate the monthly maps to a season and check both table builders agree
///
/// Purpose: Validate interval relations on calendar data read from disk
/// Benefit: Ensures the sweep line and the pairwise comparison stay equivalent
#[test]
fn test_monthly_maps_relate_to_season() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = seasonal_store(&dir);
    let temp = store.snapshot("temp@PERMANENT", None).expect("snapshot temp");
    let season = store.snapshot("season@PERMANENT", None).expect("snapshot season");

    let table = build_relation_table(&temp.maps, &season.maps).expect("relation table");
    let relations: Vec<(&str, Relation)> =
        table.iter().map(|entry| (entry.a.name(), entry.relation)).collect();
    assert_eq!(
        relations,
        vec![
            ("t1", Relation::Starts),
            ("t2", Relation::During),
            ("t3", Relation::Finishes),
            ("t4", Relation::MetBy),
        ]
    );

    let naive = build_relation_table_naive(&temp.maps, &season.maps).expect("naive table");
    assert_eq!(naive.len(), table.len());
}

#[test]
fn test_sampling_by_season_and_grid() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = seasonal_store(&dir);
    let temp = store.snapshot("temp@PERMANENT", None).expect("snapshot temp");
    let season = store.snapshot("season@PERMANENT", None).expect("snapshot season");

    let methods = MethodSet::parse("during").expect("method");
    let slots = sample_by_dataset(&[&temp], &season, &methods, false).expect("sample by season");
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].sampler.as_ref().map(|m| m.name()), Some("winter"));
    assert_eq!(
        ids(slots[0].members_of("temp@PERMANENT").expect("temp members")),
        vec!["t1@PERMANENT", "t2@PERMANENT", "t3@PERMANENT"]
    );

    // Two-month grid from January: the March-April slot holds t3 and t4
    let granularity =
        Granularity::parse("2 months", TemporalType::Absolute, None).expect("granularity");
    let slots = sample(&[&temp], &methods, Some(&granularity), false).expect("grid sample");
    assert_eq!(slots.len(), 2);
    assert_eq!(
        ids(slots[1].members_of("temp@PERMANENT").expect("temp members")),
        vec!["t3@PERMANENT", "t4@PERMANENT"]
    );
}

#[test]
fn test_filtered_snapshots_sample_subset() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = seasonal_store(&dir);
    let filter = MapFilter::parse("start_time >= '2001-03-01'").expect("filter");
    let temp = store
        .snapshot("temp@PERMANENT", Some(&filter))
        .expect("filtered snapshot");
    assert_eq!(ids(&temp.maps), vec!["t3@PERMANENT", "t4@PERMANENT"]);

    let slots = sample(&[&temp], &MethodSet::default(), None, false).expect("sample");
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].index, 0);
    assert_eq!(
        slots[0].extent.to_string(),
        "2001-03-01 00:00:00 - 2001-04-01 00:00:00"
    );
}

#[test]
fn test_granularities_of_monthly_and_daily_data() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = seasonal_store(&dir);
    let snapshots = store
        .snapshots(
            &["temp@PERMANENT".to_string(), "daily@PERMANENT".to_string()],
            None,
        )
        .expect("snapshots");

    let (per_dataset, combined) = dataset_granularities(&snapshots).expect("granularities");
    let labels: Vec<String> = per_dataset
        .iter()
        .map(|g| g.map(|g| g.to_string()).unwrap_or_default())
        .collect();
    assert_eq!(labels, vec!["1 month", "1 day"]);
    assert_eq!(combined.map(|g| g.to_string()).as_deref(), Some("1 day"));

    // Months cannot be split into ten-day granules
    let month = Granularity::parse("1 month", TemporalType::Absolute, None).expect("month");
    let ten_days = Granularity::parse("10 days", TemporalType::Absolute, None).expect("days");
    let range = TemporalExtent::interval(at("2001-01-01"), at("2001-05-01")).expect("range");
    assert!(combine_granularities(&[month, ten_days], Some(&range)).is_err());
    assert!(combine_granularities(&[month, ten_days], None).is_err());
}
