//! Configuration management and validation.
//!
//! Provides the session, metadata store, compute backend and map registry
//! settings. Values are layered: built-in defaults, then a TOML file, then
//! `TGIS_*` environment variables, then command-line overrides.

use crate::constants::{
    APP_NAME, DEFAULT_CONFIG_FILE, DEFAULT_DATABASE_FILE, DEFAULT_MAPSET, DEFAULT_NPROCS,
    DEFAULT_RASTER_INFO_MODULE, DEFAULT_RASTER_MODULE, DEFAULT_RASTER3D_INFO_MODULE,
    DEFAULT_RASTER3D_MODULE, DEFAULT_VECTOR_INFO_MODULE, DEFAULT_VECTOR_MODULE, ENV_DATABASE,
    ENV_MAPSET, ENV_NPROCS, MAX_NPROCS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Location of the metadata database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; `None` selects `<data_dir>/tgis/tgis.db`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mapset that unqualified dataset and map names resolve to
    pub mapset: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mapset: DEFAULT_MAPSET.to_string(),
        }
    }
}

/// Settings for the per-slot compute backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Number of backend invocations running at the same time
    pub nprocs: usize,

    /// Record failed slots and continue instead of aborting the run
    pub skip_failures: bool,

    /// Module evaluating raster expressions
    pub raster_module: String,

    /// Module evaluating 3D raster expressions
    pub raster3d_module: String,

    /// Module evaluating vector expressions
    pub vector_module: String,

    /// Per-invocation time limit in seconds; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            nprocs: DEFAULT_NPROCS,
            skip_failures: false,
            raster_module: DEFAULT_RASTER_MODULE.to_string(),
            raster3d_module: DEFAULT_RASTER3D_MODULE.to_string(),
            vector_module: DEFAULT_VECTOR_MODULE.to_string(),
            timeout_secs: None,
        }
    }
}

/// Settings for map existence and extent lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ask the info modules whether maps exist; when false every map is accepted
    pub check_maps: bool,

    pub raster_info_module: String,
    pub raster3d_info_module: String,
    pub vector_info_module: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            check_maps: true,
            raster_info_module: DEFAULT_RASTER_INFO_MODULE.to_string(),
            raster3d_info_module: DEFAULT_RASTER3D_INFO_MODULE.to_string(),
            vector_info_module: DEFAULT_VECTOR_INFO_MODULE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when neither `RUST_LOG` nor `-v`/`-q` is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Global configuration for a `tgis` session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub compute: ComputeConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load defaults, then the TOML file, then environment overrides.
    ///
    /// An explicit `path` must exist. Without one the per-user config file is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let config: Config = toml::from_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `TGIS_*` overrides looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(mapset) = lookup(ENV_MAPSET).filter(|v| !v.is_empty()) {
            self.session.mapset = mapset;
        }
        if let Some(nprocs) = lookup(ENV_NPROCS).filter(|v| !v.is_empty()) {
            self.compute.nprocs = nprocs.trim().parse().map_err(|_| {
                Error::configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_NPROCS, nprocs
                ))
            })?;
        }
        Ok(())
    }

    /// Set the database file
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = Some(path.into());
        self
    }

    /// Set the session mapset
    pub fn with_mapset(mut self, mapset: impl Into<String>) -> Self {
        self.session.mapset = mapset.into();
        self
    }

    /// Set the number of concurrent backend invocations
    pub fn with_nprocs(mut self, nprocs: usize) -> Self {
        self.compute.nprocs = nprocs;
        self
    }

    /// Continue past failed slots
    pub fn with_skip_failures(mut self) -> Self {
        self.compute.skip_failures = true;
        self
    }

    /// Accept every map without consulting the info modules
    pub fn without_map_checks(mut self) -> Self {
        self.registry.check_maps = false;
        self
    }

    /// Database file to open, falling back to the per-user data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME).join(DEFAULT_DATABASE_FILE))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "No data directory available; set {} or use --database",
                    ENV_DATABASE
                ))
            })
    }

    /// Check value ranges and required names
    pub fn validate(&self) -> Result<()> {
        if self.compute.nprocs == 0 || self.compute.nprocs > MAX_NPROCS {
            return Err(Error::configuration(format!(
                "nprocs must be between 1 and {}, got {}",
                MAX_NPROCS, self.compute.nprocs
            )));
        }
        if self.session.mapset.trim().is_empty() {
            return Err(Error::configuration("Mapset name must not be empty"));
        }
        if self.compute.timeout_secs == Some(0) {
            return Err(Error::configuration("compute.timeout_secs must be positive"));
        }

        let modules = [
            ("compute.raster_module", &self.compute.raster_module),
            ("compute.raster3d_module", &self.compute.raster3d_module),
            ("compute.vector_module", &self.compute.vector_module),
            ("registry.raster_info_module", &self.registry.raster_info_module),
            ("registry.raster3d_info_module", &self.registry.raster3d_info_module),
            ("registry.vector_info_module", &self.registry.vector_info_module),
        ];
        for (key, module) in modules {
            if module.trim().is_empty() {
                return Err(Error::configuration(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

/// `<config_dir>/tgis/config.toml`, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(DEFAULT_CONFIG_FILE))
}
