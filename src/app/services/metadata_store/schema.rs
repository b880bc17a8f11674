//! Metadata schema and its migration via `PRAGMA user_version`

use crate::{Error, Result};
use crate::constants::{SCHEMA_VERSION, tables};
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// Dataset table and the registration table linking datasets to their maps.
///
/// `map_id` is unique in `stds_register`: a map has at most one owning dataset.
const STDS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stds (
    id                TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    mapset            TEXT NOT NULL,
    kind              TEXT NOT NULL,
    temporal_type     TEXT NOT NULL,
    relative_unit     TEXT,
    title             TEXT NOT NULL DEFAULT '',
    description       TEXT NOT NULL DEFAULT '',
    semantic_type     TEXT NOT NULL DEFAULT 'mean',
    start_time        TEXT,
    end_time          TEXT,
    start_rel         INTEGER,
    end_rel           INTEGER,
    map_count         INTEGER NOT NULL DEFAULT 0,
    granularity       TEXT,
    creation_time     TEXT NOT NULL DEFAULT (datetime('now')),
    modification_time TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_stds_kind ON stds(kind);

CREATE TABLE IF NOT EXISTS stds_register (
    stds_id  TEXT NOT NULL REFERENCES stds(id) ON DELETE CASCADE,
    map_id   TEXT NOT NULL UNIQUE,
    map_type TEXT NOT NULL,
    PRIMARY KEY (stds_id, map_id)
);
"#;

/// Columns of the per-map-type tables; exactly one of the absolute
/// (`start_time`/`end_time`) or relative (`start_rel`/`end_rel`/`unit`)
/// column groups is filled
fn map_table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    mapset        TEXT NOT NULL,
    temporal_type TEXT NOT NULL,
    start_time    TEXT,
    end_time      TEXT,
    start_rel     INTEGER,
    end_rel       INTEGER,
    unit          TEXT,
    start_ordinal INTEGER NOT NULL,
    north         REAL NOT NULL DEFAULT 0,
    south         REAL NOT NULL DEFAULT 0,
    east          REAL NOT NULL DEFAULT 0,
    west          REAL NOT NULL DEFAULT 0,
    top           REAL NOT NULL DEFAULT 0,
    bottom        REAL NOT NULL DEFAULT 0,
    creation_time TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_{table}_start ON {table}(start_ordinal);
"#
    )
}

/// Connection settings applied on every open
pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA synchronous = NORMAL;
        ",
    )?;
    Ok(())
}

/// Current schema version via `PRAGMA user_version`
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Create missing tables and record the schema version. Idempotent.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        debug!("Metadata schema is up to date (v{})", current);
        return Ok(());
    }

    let mut sql = String::from("BEGIN IMMEDIATE;");
    sql.push_str(STDS_SCHEMA_SQL);
    for table in [tables::RASTER_BASE, tables::RASTER3D_BASE, tables::VECTOR_BASE] {
        sql.push_str(&map_table_sql(table));
    }
    sql.push_str(&format!("PRAGMA user_version = {};", SCHEMA_VERSION));
    sql.push_str("COMMIT;");
    if let Err(e) = conn.execute_batch(&sql) {
        warn!("Metadata schema migration failed, rolling back: {}", e);
        let _ = conn.execute_batch("ROLLBACK");
        return Err(Error::database(
            format!("Failed to migrate metadata schema to v{}", SCHEMA_VERSION),
            e,
        ));
    }

    info!(
        "Migrated metadata schema from v{} to v{}",
        current, SCHEMA_VERSION
    );
    Ok(())
}
