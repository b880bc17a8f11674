//! Tests for the sampling module


// Test helper functions and fixtures
use crate::app::models::{
    AbsoluteTime, DatasetKind, DatasetSnapshot, MapEntry, RelativeUnit, SpaceTimeDataset,
    SpatialExtent, TemporalExtent, TemporalType, TimeInstant,
};

pub fn day(value: i64) -> TimeInstant {
    TimeInstant::relative(value, RelativeUnit::Days)
}

pub fn interval(start: i64, end: i64) -> TemporalExtent {
    TemporalExtent::interval(day(start), day(end)).unwrap()
}

pub fn point(at: i64) -> TemporalExtent {
    TemporalExtent::point(day(at))
}

pub fn abs(text: &str) -> TimeInstant {
    TimeInstant::Absolute(AbsoluteTime::parse(text).unwrap())
}

pub fn abs_interval(start: &str, end: &str) -> TemporalExtent {
    TemporalExtent::interval(abs(start), abs(end)).unwrap()
}

pub fn raster(id: &str, extent: TemporalExtent) -> MapEntry {
    DatasetKind::Strds.new_map_entry(format!("{}@PERMANENT", id), extent, SpatialExtent::default())
}

/// Relative (days) raster dataset with the given maps
pub fn relative_snapshot(name: &str, maps: Vec<(&str, TemporalExtent)>) -> DatasetSnapshot {
    let dataset = SpaceTimeDataset::new(
        format!("{}@PERMANENT", name),
        DatasetKind::Strds,
        TemporalType::Relative,
    )
    .with_relative_unit(RelativeUnit::Days);
    DatasetSnapshot::new(
        dataset,
        maps.into_iter().map(|(id, extent)| raster(id, extent)).collect(),
    )
}

/// Absolute raster dataset with the given maps
pub fn absolute_snapshot(name: &str, maps: Vec<(&str, TemporalExtent)>) -> DatasetSnapshot {
    let dataset = SpaceTimeDataset::new(
        format!("{}@PERMANENT", name),
        DatasetKind::Strds,
        TemporalType::Absolute,
    );
    DatasetSnapshot::new(
        dataset,
        maps.into_iter().map(|(id, extent)| raster(id, extent)).collect(),
    )
}

/// Map names of one dataset in one slot
pub fn names(maps: &[MapEntry]) -> Vec<&str> {
    maps.iter().map(MapEntry::name).collect()
}
