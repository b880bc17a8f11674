//! Conversion between model types and metadata rows

use crate::app::models::{
    AbsoluteTime, DatasetAggregate, DatasetKind, MapEntry, MapType, RelativeUnit, SemanticType,
    SpaceTimeDataset, SpatialExtent, TemporalExtent, TemporalType, TimeInstant,
};
use crate::{Error, Result};

/// Time columns shared by the dataset and map tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeColumns {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub start_rel: Option<i64>,
    pub end_rel: Option<i64>,
}

impl TimeColumns {
    pub fn from_extent(extent: &TemporalExtent) -> Self {
        let mut columns = Self::default();
        match extent.start() {
            TimeInstant::Absolute(start) => {
                columns.start_time = Some(start.to_string());
                columns.end_time = extent.end().map(ToString::to_string);
            }
            TimeInstant::Relative(start) => {
                columns.start_rel = Some(start.value);
                columns.end_rel = extent.end().map(TimeInstant::ordinal);
            }
        }
        columns
    }

    /// Rebuild the extent; `None` when no start column is filled
    pub fn to_extent(
        &self,
        temporal_type: TemporalType,
        unit: Option<RelativeUnit>,
    ) -> Result<Option<TemporalExtent>> {
        let (start, end) = match temporal_type {
            TemporalType::Absolute => {
                let Some(start) = &self.start_time else {
                    return Ok(None);
                };
                let start = TimeInstant::Absolute(AbsoluteTime::parse(start)?);
                let end = self
                    .end_time
                    .as_deref()
                    .map(AbsoluteTime::parse)
                    .transpose()?
                    .map(TimeInstant::Absolute);
                (start, end)
            }
            TemporalType::Relative => {
                let Some(start) = self.start_rel else {
                    return Ok(None);
                };
                let unit = unit.unwrap_or(RelativeUnit::Untyped);
                let end = self.end_rel.map(|end| TimeInstant::relative(end, unit));
                (TimeInstant::relative(start, unit), end)
            }
        };
        Ok(Some(TemporalExtent::new(start, end)?))
    }
}

/// A map row as read from a `*_base` table
#[derive(Debug, Clone)]
pub struct RawMap {
    pub id: String,
    pub temporal_type: String,
    pub time: TimeColumns,
    pub unit: Option<String>,
    pub spatial: SpatialExtent,
}

pub const MAP_COLUMNS: &str = "m.id, m.temporal_type, m.start_time, m.end_time, m.start_rel, \
     m.end_rel, m.unit, m.north, m.south, m.east, m.west, m.top, m.bottom";

pub fn row_to_raw_map(row: &rusqlite::Row<'_>) -> std::result::Result<RawMap, rusqlite::Error> {
    Ok(RawMap {
        id: row.get(0)?,
        temporal_type: row.get(1)?,
        time: TimeColumns {
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            start_rel: row.get(4)?,
            end_rel: row.get(5)?,
        },
        unit: row.get(6)?,
        spatial: SpatialExtent {
            north: row.get(7)?,
            south: row.get(8)?,
            east: row.get(9)?,
            west: row.get(10)?,
            top: row.get(11)?,
            bottom: row.get(12)?,
        },
    })
}

impl RawMap {
    pub fn into_entry(self, map_type: MapType) -> Result<MapEntry> {
        let temporal_type: TemporalType = self.temporal_type.parse()?;
        let unit = self.unit.as_deref().map(str::parse).transpose()?;
        let extent = self.time.to_extent(temporal_type, unit)?.ok_or_else(|| {
            Error::registration(format!(
                "Map <{}> has no start time in the metadata store",
                self.id
            ))
        })?;
        Ok(MapEntry::new(self.id, extent, self.spatial, map_type))
    }
}

/// A dataset row as read from the `stds` table
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub id: String,
    pub kind: String,
    pub temporal_type: String,
    pub relative_unit: Option<String>,
    pub title: String,
    pub description: String,
    pub semantic_type: String,
    pub time: TimeColumns,
    pub map_count: i64,
    pub granularity: Option<String>,
}

pub const DATASET_COLUMNS: &str = "id, kind, temporal_type, relative_unit, title, description, \
     semantic_type, start_time, end_time, start_rel, end_rel, map_count, granularity";

pub fn row_to_raw_dataset(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<RawDataset, rusqlite::Error> {
    Ok(RawDataset {
        id: row.get(0)?,
        kind: row.get(1)?,
        temporal_type: row.get(2)?,
        relative_unit: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        semantic_type: row.get(6)?,
        time: TimeColumns {
            start_time: row.get(7)?,
            end_time: row.get(8)?,
            start_rel: row.get(9)?,
            end_rel: row.get(10)?,
        },
        map_count: row.get(11)?,
        granularity: row.get(12)?,
    })
}

impl RawDataset {
    pub fn into_dataset(self) -> Result<SpaceTimeDataset> {
        let kind: DatasetKind = self.kind.parse()?;
        let temporal_type: TemporalType = self.temporal_type.parse()?;
        let relative_unit: Option<RelativeUnit> =
            self.relative_unit.as_deref().map(str::parse).transpose()?;
        let semantic_type: SemanticType = self.semantic_type.parse()?;
        let extent = self.time.to_extent(temporal_type, relative_unit)?;

        let mut dataset = SpaceTimeDataset::new(self.id, kind, temporal_type)
            .with_title(self.title)
            .with_description(self.description)
            .with_semantic_type(semantic_type);
        dataset.relative_unit = relative_unit;
        dataset.aggregate = DatasetAggregate {
            extent,
            map_count: usize::try_from(self.map_count).unwrap_or(0),
            granularity: self.granularity,
        };
        Ok(dataset)
    }
}
