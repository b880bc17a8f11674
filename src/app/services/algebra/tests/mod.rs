//! Tests for the algebra module

pub mod parser_tests;

// Test helper functions and fixtures
use crate::app::models::{
    AbsoluteTime, DatasetKind, MapEntry, RelativeUnit, SpaceTimeDataset, SpatialExtent,
    TemporalExtent, TemporalType, TimeInstant,
};
use crate::app::services::metadata_store::TemporalDatabaseConnection;

pub fn abs(text: &str) -> TimeInstant {
    TimeInstant::Absolute(AbsoluteTime::parse(text).unwrap())
}

pub fn monthly(name: &str, start: &str, end: &str) -> MapEntry {
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(abs(start), abs(end)).unwrap(),
        SpatialExtent::new_2d(80.0, 0.0, 120.0, 0.0),
    )
}

pub fn relative(name: &str, start: i64, end: i64, spatial: SpatialExtent) -> MapEntry {
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(
            TimeInstant::relative(start, RelativeUnit::Days),
            TimeInstant::relative(end, RelativeUnit::Days),
        )
        .unwrap(),
        spatial,
    )
}

/// Store holding the absolute dataset `A` with four monthly maps of 2001
pub fn monthly_store() -> TemporalDatabaseConnection {
    let mut store = TemporalDatabaseConnection::open_in_memory("PERMANENT").unwrap();
    let dataset = SpaceTimeDataset::new("A@PERMANENT", DatasetKind::Strds, TemporalType::Absolute);
    store.create_dataset(&dataset, false).unwrap();
    store
        .register_maps(
            "A@PERMANENT",
            &[
                monthly("a1", "2001-01-01", "2001-02-01"),
                monthly("a2", "2001-02-01", "2001-03-01"),
                monthly("a3", "2001-03-01", "2001-04-01"),
                monthly("a4", "2001-04-01", "2001-05-01"),
            ],
        )
        .unwrap();
    store
}

/// Create a relative (days) raster dataset and register `maps` in it
pub fn add_relative_dataset(store: &mut TemporalDatabaseConnection, name: &str, maps: &[MapEntry]) {
    let dataset = SpaceTimeDataset::new(
        format!("{}@PERMANENT", name),
        DatasetKind::Strds,
        TemporalType::Relative,
    )
    .with_relative_unit(RelativeUnit::Days);
    store.create_dataset(&dataset, false).unwrap();
    if !maps.is_empty() {
        store
            .register_maps(&format!("{}@PERMANENT", name), maps)
            .unwrap();
    }
}

pub fn names(maps: &[MapEntry]) -> Vec<&str> {
    maps.iter().map(MapEntry::name).collect()
}
