//! Core data structures for space-time datasets and their maps.
//!
//! Defines the dataset kinds, the map entries registered in them, spatial
//! extents and the in-memory snapshots handed to the temporal services.

pub mod time;

pub use time::{
    AbsoluteTime, CalendarUnit, Increment, RelativeTime, RelativeUnit, Temporal, TemporalExtent,
    TemporalType, TimeInstant,
};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Storage type of a single map layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    Raster,
    Raster3d,
    Vector,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Raster => "raster",
            MapType::Raster3d => "raster3d",
            MapType::Vector => "vector",
        }
    }

    /// Metadata table holding maps of this type
    pub fn base_table(&self) -> &'static str {
        use crate::constants::tables;
        match self {
            MapType::Raster => tables::RASTER_BASE,
            MapType::Raster3d => tables::RASTER3D_BASE,
            MapType::Vector => tables::VECTOR_BASE,
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three kinds of space-time dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Space-time raster dataset
    Strds,
    /// Space-time vector dataset
    Stvds,
    /// Space-time 3D raster dataset
    Str3ds,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [DatasetKind::Strds, DatasetKind::Stvds, DatasetKind::Str3ds];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Strds => "strds",
            DatasetKind::Stvds => "stvds",
            DatasetKind::Str3ds => "str3ds",
        }
    }

    /// Type of the maps a dataset of this kind holds
    pub fn map_type(&self) -> MapType {
        match self {
            DatasetKind::Strds => MapType::Raster,
            DatasetKind::Stvds => MapType::Vector,
            DatasetKind::Str3ds => MapType::Raster3d,
        }
    }

    /// Create a map entry of the type this dataset kind holds
    pub fn new_map_entry(
        &self,
        id: impl Into<String>,
        extent: TemporalExtent,
        spatial_extent: SpatialExtent,
    ) -> MapEntry {
        MapEntry::new(id, extent, spatial_extent, self.map_type())
    }

    /// Whether neighbourhood offsets may address a depth coordinate
    pub fn supports_depth(&self) -> bool {
        matches!(self, DatasetKind::Str3ds)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strds" | "raster" => Ok(DatasetKind::Strds),
            "stvds" | "vector" => Ok(DatasetKind::Stvds),
            "str3ds" | "raster3d" | "raster_3d" => Ok(DatasetKind::Str3ds),
            other => Err(Error::invalid_value(format!(
                "Unknown dataset type '{}' (expected strds, stvds or str3ds)",
                other
            ))),
        }
    }
}

/// Statistical meaning of the values in a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    #[default]
    Mean,
    Min,
    Max,
    Sum,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Mean => "mean",
            SemanticType::Min => "min",
            SemanticType::Max => "max",
            SemanticType::Sum => "sum",
        }
    }
}

impl FromStr for SemanticType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(SemanticType::Mean),
            "min" => Ok(SemanticType::Min),
            "max" => Ok(SemanticType::Max),
            "sum" => Ok(SemanticType::Sum),
            other => Err(Error::invalid_value(format!("Unknown semantic type '{}'", other))),
        }
    }
}

/// Bounding box of a map; `top`/`bottom` are zero for 2D maps
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub top: f64,
    pub bottom: f64,
}

impl SpatialExtent {
    pub fn new_2d(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
            top: 0.0,
            bottom: 0.0,
        }
    }

    /// True if the boxes share any area (touching edges count)
    pub fn intersects(&self, other: &SpatialExtent) -> bool {
        let horizontal = self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north;
        let vertical = self.bottom <= other.top && other.bottom <= self.top;
        horizontal && vertical
    }

    pub fn union(&self, other: &SpatialExtent) -> SpatialExtent {
        SpatialExtent {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

/// Split `name@mapset` into its parts
pub fn split_id(id: &str) -> (&str, Option<&str>) {
    match id.split_once('@') {
        Some((name, mapset)) => (name, Some(mapset)),
        None => (id, None),
    }
}

/// Append `@mapset` unless the name is already qualified
pub fn qualify(name: &str, mapset: &str) -> String {
    if name.contains('@') {
        name.to_string()
    } else {
        format!("{}@{}", name, mapset)
    }
}

/// A single time-stamped map registered in a space-time dataset
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// `name@mapset`
    pub id: String,
    pub extent: TemporalExtent,
    pub spatial_extent: SpatialExtent,
    pub map_type: MapType,
}

impl MapEntry {
    pub fn new(
        id: impl Into<String>,
        extent: TemporalExtent,
        spatial_extent: SpatialExtent,
        map_type: MapType,
    ) -> Self {
        Self {
            id: id.into(),
            extent,
            spatial_extent,
            map_type,
        }
    }

    pub fn name(&self) -> &str {
        split_id(&self.id).0
    }

    pub fn mapset(&self) -> Option<&str> {
        split_id(&self.id).1
    }

    /// Order by start time, then id
    pub fn order(&self, other: &MapEntry) -> Ordering {
        self.extent
            .start_ordinal()
            .cmp(&other.extent.start_ordinal())
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl Temporal for MapEntry {
    fn temporal_extent(&self) -> &TemporalExtent {
        &self.extent
    }
}

/// Cached metadata derived from the registered maps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetAggregate {
    pub extent: Option<TemporalExtent>,
    pub map_count: usize,
    pub granularity: Option<String>,
}

/// A named, ordered collection of time-stamped maps
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceTimeDataset {
    /// `name@mapset`
    pub id: String,
    pub kind: DatasetKind,
    pub temporal_type: TemporalType,
    /// Unit of relative time stamps; `None` for absolute datasets
    pub relative_unit: Option<RelativeUnit>,
    pub title: String,
    pub description: String,
    pub semantic_type: SemanticType,
    pub aggregate: DatasetAggregate,
}

impl SpaceTimeDataset {
    pub fn new(id: impl Into<String>, kind: DatasetKind, temporal_type: TemporalType) -> Self {
        let relative_unit = match temporal_type {
            TemporalType::Absolute => None,
            TemporalType::Relative => Some(RelativeUnit::Untyped),
        };
        Self {
            id: id.into(),
            kind,
            temporal_type,
            relative_unit,
            title: String::new(),
            description: String::new(),
            semantic_type: SemanticType::default(),
            aggregate: DatasetAggregate::default(),
        }
    }

    pub fn with_relative_unit(mut self, unit: RelativeUnit) -> Self {
        self.relative_unit = Some(unit);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_semantic_type(mut self, semantic_type: SemanticType) -> Self {
        self.semantic_type = semantic_type;
        self
    }

    pub fn name(&self) -> &str {
        split_id(&self.id).0
    }

    /// Fails unless the map's type and temporal kind match this dataset
    pub fn check_member(&self, map: &MapEntry) -> Result<()> {
        if map.map_type != self.kind.map_type() {
            return Err(Error::registration(format!(
                "Map <{}> is a {} map and cannot be registered in {} <{}>",
                map.id, map.map_type, self.kind, self.id
            )));
        }
        if map.extent.temporal_type() != self.temporal_type
            || map.extent.relative_unit() != self.relative_unit
        {
            return Err(Error::type_mismatch(
                self.time_label(),
                map.extent.start().kind_label(),
            ));
        }
        Ok(())
    }

    fn time_label(&self) -> String {
        match self.relative_unit {
            Some(unit) => format!("relative time ({})", unit),
            None => "absolute time".to_string(),
        }
    }
}

/// A dataset together with its registered maps, sorted by start time then id
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    pub dataset: SpaceTimeDataset,
    pub maps: Vec<MapEntry>,
}

impl DatasetSnapshot {
    pub fn new(dataset: SpaceTimeDataset, mut maps: Vec<MapEntry>) -> Self {
        maps.sort_by(MapEntry::order);
        Self { dataset, maps }
    }

    pub fn id(&self) -> &str {
        &self.dataset.id
    }

    /// Position of a map in the sorted map list
    pub fn position_of(&self, map_id: &str) -> Option<usize> {
        self.maps.iter().position(|map| map.id == map_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: i64) -> TimeInstant {
        TimeInstant::relative(value, RelativeUnit::Days)
    }

    #[test]
    fn test_dataset_kind_parsing() {
        assert_eq!("strds".parse::<DatasetKind>().unwrap(), DatasetKind::Strds);
        assert_eq!("STR3DS".parse::<DatasetKind>().unwrap(), DatasetKind::Str3ds);
        assert_eq!("vector".parse::<DatasetKind>().unwrap(), DatasetKind::Stvds);
        assert!("stxds".parse::<DatasetKind>().is_err());
        assert_eq!(DatasetKind::Str3ds.map_type(), MapType::Raster3d);
        assert_eq!(DatasetKind::Stvds.map_type().base_table(), "vector_base");
    }

    #[test]
    fn test_id_helpers() {
        assert_eq!(split_id("a1@PERMANENT"), ("a1", Some("PERMANENT")));
        assert_eq!(split_id("a1"), ("a1", None));
        assert_eq!(qualify("a1", "user1"), "a1@user1");
        assert_eq!(qualify("a1@PERMANENT", "user1"), "a1@PERMANENT");
    }

    #[test]
    fn test_spatial_intersection() {
        let a = SpatialExtent::new_2d(10.0, 0.0, 10.0, 0.0);
        let b = SpatialExtent::new_2d(20.0, 10.0, 20.0, 10.0);
        let c = SpatialExtent::new_2d(30.0, 21.0, 30.0, 21.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&c).north, 30.0);
    }

    #[test]
    fn test_check_member() {
        let dataset =
            SpaceTimeDataset::new("A@PERMANENT", DatasetKind::Strds, TemporalType::Relative)
                .with_relative_unit(RelativeUnit::Days);
        let extent = TemporalExtent::interval(day(1), day(2)).unwrap();

        let raster =
            DatasetKind::Strds.new_map_entry("a1@PERMANENT", extent, SpatialExtent::default());
        assert!(dataset.check_member(&raster).is_ok());

        let vector =
            DatasetKind::Stvds.new_map_entry("v1@PERMANENT", extent, SpatialExtent::default());
        assert!(matches!(dataset.check_member(&vector), Err(Error::Registration { .. })));

        let years = TemporalExtent::point(TimeInstant::relative(1, RelativeUnit::Years));
        let wrong_unit =
            DatasetKind::Strds.new_map_entry("a2@PERMANENT", years, SpatialExtent::default());
        assert!(matches!(
            dataset.check_member(&wrong_unit),
            Err(Error::TemporalTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_sorts_maps() {
        let dataset =
            SpaceTimeDataset::new("A@PERMANENT", DatasetKind::Strds, TemporalType::Relative)
                .with_relative_unit(RelativeUnit::Days);
        let make = |id: &str, start: i64| {
            DatasetKind::Strds.new_map_entry(
                id,
                TemporalExtent::point(day(start)),
                SpatialExtent::default(),
            )
        };
        let snapshot = DatasetSnapshot::new(
            dataset,
            vec![make("c@P", 3), make("b@P", 1), make("a@P", 1)],
        );
        let ids: Vec<_> = snapshot.maps.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a@P", "b@P", "c@P"]);
        assert_eq!(snapshot.position_of("c@P"), Some(2));
    }
}
