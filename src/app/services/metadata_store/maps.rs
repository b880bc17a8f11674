//! Map registration, listing and consistent dataset snapshots

use super::TemporalDatabaseConnection;
use super::datasets::{create_in, find_in, refresh_aggregate};
use super::filter::MapFilter;
use super::rows::{MAP_COLUMNS, RawMap, TimeColumns, row_to_raw_map};
use crate::app::models::{DatasetSnapshot, MapEntry, MapType, SpaceTimeDataset, split_id};
use crate::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

impl TemporalDatabaseConnection {
    /// Register maps in a dataset and refresh its aggregate metadata.
    ///
    /// All maps are registered or none: a map of the wrong type or temporal
    /// kind, or one already owned by any dataset, aborts the whole call.
    pub fn register_maps(&mut self, dataset_id: &str, maps: &[MapEntry]) -> Result<usize> {
        let tx = self.connection_mut().transaction()?;
        let dataset = find_in(&tx, dataset_id)?.ok_or_else(|| Error::unknown_dataset(dataset_id))?;
        let registered = register_in(&tx, &dataset, maps)?;
        tx.commit()?;
        info!("Registered {} maps in <{}>", registered, dataset.id);
        Ok(registered)
    }

    /// Remove maps from a dataset together with their time stamps
    pub fn unregister_maps(&mut self, dataset_id: &str, map_ids: &[String]) -> Result<usize> {
        let tx = self.connection_mut().transaction()?;
        let dataset = find_in(&tx, dataset_id)?.ok_or_else(|| Error::unknown_dataset(dataset_id))?;
        let table = dataset.kind.map_type().base_table();

        for map_id in map_ids {
            let removed = tx.execute(
                "DELETE FROM stds_register WHERE stds_id = ?1 AND map_id = ?2",
                params![dataset.id, map_id],
            )?;
            if removed == 0 {
                return Err(Error::registration(format!(
                    "Map <{}> is not registered in <{}>",
                    map_id, dataset.id
                )));
            }
            tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![map_id])?;
        }
        refresh_aggregate(&tx, &dataset)?;
        tx.commit()?;
        info!("Unregistered {} maps from <{}>", map_ids.len(), dataset.id);
        Ok(map_ids.len())
    }

    /// Maps of a dataset ordered by start time then id
    pub fn list_maps(&self, dataset_id: &str, filter: Option<&MapFilter>) -> Result<Vec<MapEntry>> {
        let dataset = self.get_dataset(dataset_id)?;
        load_maps(self.connection(), &dataset, filter)
    }

    pub fn find_map(&self, map_type: MapType, id: &str) -> Result<Option<MapEntry>> {
        let table = map_type.base_table();
        let sql = format!("SELECT {MAP_COLUMNS} FROM {table} m WHERE m.id = ?1");
        self.connection()
            .query_row(&sql, params![id], row_to_raw_map)
            .optional()?
            .map(|raw| raw.into_entry(map_type))
            .transpose()
    }

    /// Dataset owning the map, if any
    pub fn owner_of(&self, map_id: &str) -> Result<Option<String>> {
        owner_in(self.connection(), map_id)
    }

    pub fn snapshot(
        &self,
        dataset_id: &str,
        filter: Option<&MapFilter>,
    ) -> Result<DatasetSnapshot> {
        let mut snapshots = self.snapshots(&[dataset_id.to_string()], filter)?;
        snapshots
            .pop()
            .ok_or_else(|| Error::unknown_dataset(dataset_id))
    }

    /// Datasets and their maps, read inside one transaction so that all of
    /// them reflect the same committed state
    pub fn snapshots(
        &self,
        dataset_ids: &[String],
        filter: Option<&MapFilter>,
    ) -> Result<Vec<DatasetSnapshot>> {
        let tx = self.connection().unchecked_transaction()?;
        let mut snapshots = Vec::with_capacity(dataset_ids.len());
        for id in dataset_ids {
            let dataset = find_in(&tx, id)?.ok_or_else(|| Error::unknown_dataset(id))?;
            let maps = load_maps(&tx, &dataset, filter)?;
            debug!("Snapshot of <{}>: {} maps", dataset.id, maps.len());
            snapshots.push(DatasetSnapshot::new(dataset, maps));
        }
        tx.commit()?;
        Ok(snapshots)
    }

    /// Create (or, with `overwrite`, replace) `dataset` and register `maps` in
    /// it, in order, as one transaction
    pub fn register_outputs(
        &mut self,
        dataset: &SpaceTimeDataset,
        maps: &[MapEntry],
        overwrite: bool,
    ) -> Result<usize> {
        let tx = self.connection_mut().transaction()?;
        create_in(&tx, dataset, overwrite)?;
        let registered = register_in(&tx, dataset, maps)?;
        tx.commit()?;
        info!("Registered {} result maps in <{}>", registered, dataset.id);
        Ok(registered)
    }
}

fn owner_in(conn: &Connection, map_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT stds_id FROM stds_register WHERE map_id = ?1",
            params![map_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn register_in(conn: &Connection, dataset: &SpaceTimeDataset, maps: &[MapEntry]) -> Result<usize> {
    let table = dataset.kind.map_type().base_table();
    let insert_map = format!(
        "INSERT OR REPLACE INTO {table} (id, name, mapset, temporal_type, start_time, end_time,
                                        start_rel, end_rel, unit, start_ordinal,
                                        north, south, east, west, top, bottom)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    );
    let mut insert_map = conn.prepare(&insert_map)?;
    let mut insert_registration = conn.prepare(
        "INSERT INTO stds_register (stds_id, map_id, map_type) VALUES (?1, ?2, ?3)",
    )?;

    for map in maps {
        dataset.check_member(map)?;
        let (name, mapset) = split_id(&map.id);
        let Some(mapset) = mapset else {
            return Err(Error::registration(format!(
                "Map id <{}> must be qualified as name@mapset",
                map.id
            )));
        };
        if let Some(owner) = owner_in(conn, &map.id)? {
            return Err(Error::registration(format!(
                "Map <{}> is already registered in <{}>",
                map.id, owner
            )));
        }

        let time = TimeColumns::from_extent(&map.extent);
        let spatial = &map.spatial_extent;
        insert_map.execute(params![
            map.id,
            name,
            mapset,
            map.extent.temporal_type().as_str(),
            time.start_time,
            time.end_time,
            time.start_rel,
            time.end_rel,
            map.extent.relative_unit().map(|unit| unit.as_str()),
            map.extent.start_ordinal(),
            spatial.north,
            spatial.south,
            spatial.east,
            spatial.west,
            spatial.top,
            spatial.bottom,
        ])?;
        insert_registration.execute(params![dataset.id, map.id, map.map_type.as_str()])?;
    }

    refresh_aggregate(conn, dataset)?;
    Ok(maps.len())
}

/// Maps registered in `dataset`, ordered by start time then id
pub(crate) fn load_maps(
    conn: &Connection,
    dataset: &SpaceTimeDataset,
    filter: Option<&MapFilter>,
) -> Result<Vec<MapEntry>> {
    let map_type = dataset.kind.map_type();
    let table = map_type.base_table();
    let (filter_sql, filter_values) = filter.map(|f| f.to_sql(2)).unwrap_or_default();
    let sql = format!(
        "SELECT {MAP_COLUMNS} FROM {table} m
         JOIN stds_register r ON r.map_id = m.id
         WHERE r.stds_id = ?1{filter_sql}
         ORDER BY m.start_ordinal, m.id"
    );

    let mut values = vec![Value::Text(dataset.id.clone())];
    values.extend(filter_values);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_raw_map)?;
    rows.collect::<std::result::Result<Vec<RawMap>, _>>()?
        .into_iter()
        .map(|raw| raw.into_entry(map_type))
        .collect()
}
