//! Application constants for the temporal GIS engine
//!
//! This module contains default values, table names and textual conventions
//! used throughout the library and the `tgis` command-line tool.

// =============================================================================
// Session Defaults
// =============================================================================

/// Mapset used when a dataset or map name carries no `@mapset` suffix
pub const DEFAULT_MAPSET: &str = "PERMANENT";

/// Name of the tool, used for config and data directories
pub const APP_NAME: &str = "tgis";

/// Metadata database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "tgis.db";

/// Config file name inside the config directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

// =============================================================================
// Environment Overrides
// =============================================================================

/// Overrides `database.path`
pub const ENV_DATABASE: &str = "TGIS_DATABASE";

/// Overrides `session.mapset`
pub const ENV_MAPSET: &str = "TGIS_MAPSET";

/// Overrides `compute.nprocs`
pub const ENV_NPROCS: &str = "TGIS_NPROCS";

// =============================================================================
// Execution Defaults
// =============================================================================

/// Default number of concurrent backend invocations
pub const DEFAULT_NPROCS: usize = 1;

/// Upper bound accepted for `nprocs`
pub const MAX_NPROCS: usize = 256;

/// Backend module evaluating raster expressions
pub const DEFAULT_RASTER_MODULE: &str = "r.mapcalc";

/// Backend module evaluating 3D raster expressions
pub const DEFAULT_RASTER3D_MODULE: &str = "r3.mapcalc";

/// Backend module evaluating vector expressions
pub const DEFAULT_VECTOR_MODULE: &str = "v.mapcalc";

/// Modules reporting map extents in shell style (`north=...`)
pub const DEFAULT_RASTER_INFO_MODULE: &str = "r.info";
pub const DEFAULT_RASTER3D_INFO_MODULE: &str = "r3.info";
pub const DEFAULT_VECTOR_INFO_MODULE: &str = "v.info";

/// Upper bound on the number of slots a sampling grid may contain
pub const MAX_SAMPLE_SLOTS: usize = 1_000_000;

/// Literal substituted for a missing operand when null registration is requested
pub const NULL_LITERAL: &str = "null()";

// =============================================================================
// Output Formatting
// =============================================================================

/// Default column separator for list and sample output
pub const DEFAULT_SEPARATOR: &str = "|";

/// Marker printed for a dataset without maps in a slot
pub const NO_DATA_MARKER: &str = "None";

/// Display format for absolute time stamps
pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Time Arithmetic
// =============================================================================

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 604_800;
pub const MONTHS_PER_YEAR: i64 = 12;

// =============================================================================
// Metadata Store
// =============================================================================

/// Table names, one per map type
pub mod tables {
    pub const STDS: &str = "stds";
    pub const STDS_REGISTER: &str = "stds_register";
    pub const RASTER_BASE: &str = "raster_base";
    pub const RASTER3D_BASE: &str = "raster3d_base";
    pub const VECTOR_BASE: &str = "vector_base";
}

/// Columns a `--where` filter may reference
pub const FILTERABLE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "mapset",
    "start_time",
    "end_time",
    "start_rel",
    "end_rel",
    "north",
    "south",
    "east",
    "west",
];

/// Current schema version written to `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;
