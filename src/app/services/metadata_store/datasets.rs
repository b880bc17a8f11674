//! Dataset rows and their cached aggregate metadata

use super::TemporalDatabaseConnection;
use super::maps::load_maps;
use super::rows::{DATASET_COLUMNS, RawDataset, TimeColumns, row_to_raw_dataset};
use crate::app::models::{DatasetAggregate, DatasetKind, SpaceTimeDataset, split_id};
use crate::app::services::granularity::compute_common_granularity;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

impl TemporalDatabaseConnection {
    /// Create a dataset; with `overwrite` an existing one is emptied and replaced
    pub fn create_dataset(&mut self, dataset: &SpaceTimeDataset, overwrite: bool) -> Result<()> {
        let tx = self.connection_mut().transaction()?;
        create_in(&tx, dataset, overwrite)?;
        tx.commit()?;
        info!("Created {} <{}>", dataset.kind, dataset.id);
        Ok(())
    }

    pub fn find_dataset(&self, id: &str) -> Result<Option<SpaceTimeDataset>> {
        find_in(self.connection(), id)
    }

    /// Fails with [`Error::UnknownDataset`] when `id` is not registered
    pub fn get_dataset(&self, id: &str) -> Result<SpaceTimeDataset> {
        self.find_dataset(id)?
            .ok_or_else(|| Error::unknown_dataset(id))
    }

    /// All datasets, optionally of one kind, ordered by id
    pub fn list_datasets(&self, kind: Option<DatasetKind>) -> Result<Vec<SpaceTimeDataset>> {
        let sql = format!(
            "SELECT {DATASET_COLUMNS} FROM stds WHERE (?1 IS NULL OR kind = ?1) ORDER BY id"
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt.query_map(params![kind.map(|k| k.as_str())], row_to_raw_dataset)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(RawDataset::into_dataset)
            .collect()
    }

    /// Remove a dataset, detaching its maps. Returns the number of detached maps.
    pub fn remove_dataset(&mut self, id: &str) -> Result<usize> {
        let tx = self.connection_mut().transaction()?;
        let dataset = find_in(&tx, id)?.ok_or_else(|| Error::unknown_dataset(id))?;
        let detached = detach_all(&tx, &dataset)?;
        tx.execute("DELETE FROM stds WHERE id = ?1", params![dataset.id])?;
        tx.commit()?;
        info!("Removed {} <{}> ({} maps detached)", dataset.kind, dataset.id, detached);
        Ok(detached)
    }
}

pub(crate) fn find_in(conn: &Connection, id: &str) -> Result<Option<SpaceTimeDataset>> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM stds WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_raw_dataset)
        .optional()?
        .map(RawDataset::into_dataset)
        .transpose()
}

pub(crate) fn create_in(
    conn: &Connection,
    dataset: &SpaceTimeDataset,
    overwrite: bool,
) -> Result<()> {
    let (name, mapset) = split_id(&dataset.id);
    let Some(mapset) = mapset else {
        return Err(Error::invalid_value(format!(
            "Dataset id <{}> must be qualified as name@mapset",
            dataset.id
        )));
    };
    if name.is_empty() {
        return Err(Error::invalid_value("Dataset name must not be empty"));
    }

    if let Some(existing) = find_in(conn, &dataset.id)? {
        if !overwrite {
            return Err(Error::registration(format!(
                "{} <{}> already exists; use overwrite to replace it",
                existing.kind, existing.id
            )));
        }
        let detached = detach_all(conn, &existing)?;
        conn.execute("DELETE FROM stds WHERE id = ?1", params![existing.id])?;
        debug!("Replacing <{}>: {} maps detached", existing.id, detached);
    }

    conn.execute(
        "INSERT INTO stds (id, name, mapset, kind, temporal_type, relative_unit, title,
                           description, semantic_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            dataset.id,
            name,
            mapset,
            dataset.kind.as_str(),
            dataset.temporal_type.as_str(),
            dataset.relative_unit.map(|unit| unit.as_str()),
            dataset.title,
            dataset.description,
            dataset.semantic_type.as_str(),
        ],
    )?;
    Ok(())
}

/// Drop every registration of the dataset together with the maps' time stamps
pub(crate) fn detach_all(conn: &Connection, dataset: &SpaceTimeDataset) -> Result<usize> {
    let table = dataset.kind.map_type().base_table();
    conn.execute(
        &format!(
            "DELETE FROM {table} WHERE id IN (SELECT map_id FROM stds_register WHERE stds_id = ?1)"
        ),
        params![dataset.id],
    )?;
    let detached = conn.execute(
        "DELETE FROM stds_register WHERE stds_id = ?1",
        params![dataset.id],
    )?;
    refresh_aggregate(conn, dataset)?;
    Ok(detached)
}

/// Recompute extent, map count and granularity from the registered maps
pub(crate) fn refresh_aggregate(
    conn: &Connection,
    dataset: &SpaceTimeDataset,
) -> Result<DatasetAggregate> {
    let maps = load_maps(conn, dataset, None)?;

    let mut extent = None;
    for map in &maps {
        extent = Some(match extent {
            None => map.extent,
            Some(current) => map.extent.union(&current)?,
        });
    }
    let extents: Vec<_> = maps.iter().map(|map| map.extent).collect();
    let granularity = compute_common_granularity(&extents)
        .ok()
        .map(|granularity| granularity.to_string());

    let aggregate = DatasetAggregate {
        extent,
        map_count: maps.len(),
        granularity,
    };
    let time = aggregate
        .extent
        .as_ref()
        .map(TimeColumns::from_extent)
        .unwrap_or_default();

    conn.execute(
        "UPDATE stds
         SET start_time = ?2, end_time = ?3, start_rel = ?4, end_rel = ?5,
             map_count = ?6, granularity = ?7, modification_time = datetime('now')
         WHERE id = ?1",
        params![
            dataset.id,
            time.start_time,
            time.end_time,
            time.start_rel,
            time.end_rel,
            aggregate.map_count as i64,
            aggregate.granularity,
        ],
    )?;
    debug!(
        "Aggregate of <{}>: {} maps, granularity {:?}",
        dataset.id, aggregate.map_count, aggregate.granularity
    );
    Ok(aggregate)
}
