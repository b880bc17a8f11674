//! SQLite metadata store for space-time datasets and their maps
//!
//! The store is an explicit [`TemporalDatabaseConnection`] opened at session
//! start and passed by reference to every operation that needs it. All SQL is
//! parameterized; user supplied values never end up in statement text.
//!
//! # Architecture
//!
//! - [`schema`] - Table definitions and migration via `PRAGMA user_version`
//! - [`rows`] - Conversion between rows and model types
//! - [`filter`] - `--where` filters compiled into parameterized SQL
//! - [`datasets`] - Dataset creation, lookup, removal and aggregate metadata
//! - [`maps`] - Map registration, listing and consistent snapshots
//!
//! # Ownership
//!
//! A map is registered in at most one dataset. Registering it a second time
//! fails with [`crate::Error::Registration`] and leaves the store unchanged.

pub mod datasets;
pub mod filter;
pub mod maps;
pub mod rows;
pub mod schema;

#[cfg(test)]
pub mod tests;

pub use filter::MapFilter;

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An open metadata database bound to a mapset
#[derive(Debug)]
pub struct TemporalDatabaseConnection {
    conn: Connection,
    path: Option<PathBuf>,
    mapset: String,
}

impl TemporalDatabaseConnection {
    /// Open (creating if needed) the database file at `path`
    pub fn open(path: impl AsRef<Path>, mapset: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(
                    format!("Failed to create database directory {}", parent.display()),
                    e,
                )
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            Error::database(format!("Failed to open metadata store {}", path.display()), e)
        })?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Metadata store journal mode: {}", journal);
        let connection = Self::initialize(conn, Some(path.to_path_buf()), mapset.into())?;
        info!("Opened metadata store {}", path.display());
        Ok(connection)
    }

    /// Open a private in-memory database
    pub fn open_in_memory(mapset: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, None, mapset.into())
    }

    fn initialize(conn: Connection, path: Option<PathBuf>, mapset: String) -> Result<Self> {
        if mapset.trim().is_empty() {
            return Err(Error::configuration("Mapset name must not be empty"));
        }
        schema::apply_pragmas(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn, path, mapset })
    }

    /// Close the connection, reporting any error SQLite raises on close
    pub fn close(self) -> Result<()> {
        debug!("Closing metadata store");
        self.conn
            .close()
            .map_err(|(_, e)| Error::database("Failed to close metadata store", e))
    }

    /// Mapset that unqualified names resolve to
    pub fn mapset(&self) -> &str {
        &self.mapset
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Qualify `name` with the session mapset unless it already carries one
    pub fn qualify(&self, name: &str) -> String {
        crate::app::models::qualify(name, &self.mapset)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
