//! Tests for the metadata store

pub mod dataset_tests;

// Test helper functions and fixtures
use crate::app::models::{
    AbsoluteTime, DatasetKind, MapEntry, RelativeUnit, SpaceTimeDataset, SpatialExtent,
    TemporalExtent, TemporalType, TimeInstant,
};
use crate::app::services::metadata_store::TemporalDatabaseConnection;

pub fn store() -> TemporalDatabaseConnection {
    TemporalDatabaseConnection::open_in_memory("PERMANENT").unwrap()
}

pub fn absolute_dataset(name: &str) -> SpaceTimeDataset {
    SpaceTimeDataset::new(
        format!("{}@PERMANENT", name),
        DatasetKind::Strds,
        TemporalType::Absolute,
    )
    .with_title(format!("Dataset {}", name))
}

pub fn relative_dataset(name: &str) -> SpaceTimeDataset {
    SpaceTimeDataset::new(
        format!("{}@PERMANENT", name),
        DatasetKind::Strds,
        TemporalType::Relative,
    )
    .with_relative_unit(RelativeUnit::Days)
}

pub fn abs(text: &str) -> TimeInstant {
    TimeInstant::Absolute(AbsoluteTime::parse(text).unwrap())
}

/// Raster map covering one month starting at `start`
pub fn monthly(name: &str, start: &str, end: &str) -> MapEntry {
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(abs(start), abs(end)).unwrap(),
        SpatialExtent::new_2d(80.0, 0.0, 120.0, 0.0),
    )
}

/// Raster map stamped with a relative interval in days
pub fn relative(name: &str, start: i64, end: i64) -> MapEntry {
    DatasetKind::Strds.new_map_entry(
        format!("{}@PERMANENT", name),
        TemporalExtent::interval(
            TimeInstant::relative(start, RelativeUnit::Days),
            TimeInstant::relative(end, RelativeUnit::Days),
        )
        .unwrap(),
        SpatialExtent::default(),
    )
}

pub fn four_months() -> Vec<MapEntry> {
    vec![
        monthly("a1", "2001-01-01", "2001-02-01"),
        monthly("a2", "2001-02-01", "2001-03-01"),
        monthly("a3", "2001-03-01", "2001-04-01"),
        monthly("a4", "2001-04-01", "2001-05-01"),
    ]
}
