//! Tests for the temporal topology module

pub mod relation_tests;

// Test helper functions and fixtures
use crate::app::models::{
    AbsoluteTime, DatasetKind, MapEntry, RelativeUnit, SpatialExtent, TemporalExtent, TimeInstant,
};

/// Relative point extent in days
pub fn point(at: i64) -> TemporalExtent {
    TemporalExtent::point(TimeInstant::relative(at, RelativeUnit::Days))
}

/// Relative interval extent in days
pub fn interval(start: i64, end: i64) -> TemporalExtent {
    TemporalExtent::interval(
        TimeInstant::relative(start, RelativeUnit::Days),
        TimeInstant::relative(end, RelativeUnit::Days),
    )
    .unwrap()
}

/// Absolute interval extent from two date strings
pub fn absolute_interval(start: &str, end: &str) -> TemporalExtent {
    TemporalExtent::interval(
        TimeInstant::Absolute(AbsoluteTime::parse(start).unwrap()),
        TimeInstant::Absolute(AbsoluteTime::parse(end).unwrap()),
    )
    .unwrap()
}

/// Raster map entry with the given extent
pub fn map(id: &str, extent: TemporalExtent) -> MapEntry {
    DatasetKind::Strds.new_map_entry(format!("{}@PERMANENT", id), extent, SpatialExtent::default())
}

/// Every point and interval with endpoints in `0..=max`
pub fn all_extents(max: i64) -> Vec<TemporalExtent> {
    let mut extents = Vec::new();
    for start in 0..=max {
        extents.push(point(start));
        for end in (start + 1)..=max {
            extents.push(interval(start, end));
        }
    }
    extents
}
