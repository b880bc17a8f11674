//! Lookup of map existence and spatial extent
//!
//! The registry answers whether a map exists in storage and what area it
//! covers. [`CommandMapRegistry`] asks the `r.info`-style modules, the other
//! implementations serve workflows without access to map storage.

use crate::app::models::{MapType, SpatialExtent};
use crate::config::RegistryConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::RwLock;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait MapRegistry: Send + Sync {
    async fn exists(&self, map_type: MapType, id: &str) -> Result<bool>;

    /// Spatial extent, or `None` if the registry cannot tell
    async fn get_extent(&self, map_type: MapType, id: &str) -> Result<Option<SpatialExtent>>;
}

/// Runs `r.info -g`, `r3.info -g` or `v.info -g`
#[derive(Debug, Clone)]
pub struct CommandMapRegistry {
    raster_module: String,
    raster3d_module: String,
    vector_module: String,
}

impl CommandMapRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            raster_module: config.raster_info_module.clone(),
            raster3d_module: config.raster3d_info_module.clone(),
            vector_module: config.vector_info_module.clone(),
        }
    }

    fn module(&self, map_type: MapType) -> &str {
        match map_type {
            MapType::Raster => &self.raster_module,
            MapType::Raster3d => &self.raster3d_module,
            MapType::Vector => &self.vector_module,
        }
    }

    /// Shell-style output of the info module, `None` if the map is unknown
    async fn query(&self, map_type: MapType, id: &str) -> Result<Option<String>> {
        let module = self.module(map_type);
        debug!("Querying {} for <{}>", module, id);
        let output = Command::new(module)
            .arg("-g")
            .arg(format!("map={}", id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::map_registry(format!("Failed to run {}: {}", module, e)))?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// Parse `key=value` lines as printed by `r.info -g`
pub fn parse_shell_extent(text: &str) -> Result<SpatialExtent> {
    let values: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    let read = |key: &str, required: bool| -> Result<f64> {
        match values.get(key) {
            Some(value) => value.parse().map_err(|_| {
                Error::map_registry(format!("Invalid value '{}' for {}", value, key))
            }),
            None if required => Err(Error::map_registry(format!(
                "Missing '{}' in map info output",
                key
            ))),
            None => Ok(0.0),
        }
    };

    Ok(SpatialExtent {
        north: read("north", true)?,
        south: read("south", true)?,
        east: read("east", true)?,
        west: read("west", true)?,
        top: read("top", false)?,
        bottom: read("bottom", false)?,
    })
}

#[async_trait]
impl MapRegistry for CommandMapRegistry {
    async fn exists(&self, map_type: MapType, id: &str) -> Result<bool> {
        Ok(self.query(map_type, id).await?.is_some())
    }

    async fn get_extent(&self, map_type: MapType, id: &str) -> Result<Option<SpatialExtent>> {
        self.query(map_type, id)
            .await?
            .map(|text| parse_shell_extent(&text))
            .transpose()
    }
}

/// Registry backed by a map held in memory
#[derive(Debug, Default)]
pub struct InMemoryMapRegistry {
    maps: RwLock<HashMap<(MapType, String), SpatialExtent>>,
}

impl InMemoryMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, map_type: MapType, id: impl Into<String>, extent: SpatialExtent) {
        if let Ok(mut maps) = self.maps.write() {
            maps.insert((map_type, id.into()), extent);
        }
    }

    pub fn with_map(self, map_type: MapType, id: impl Into<String>, extent: SpatialExtent) -> Self {
        self.insert(map_type, id, extent);
        self
    }
}

#[async_trait]
impl MapRegistry for InMemoryMapRegistry {
    async fn exists(&self, map_type: MapType, id: &str) -> Result<bool> {
        Ok(self.get_extent(map_type, id).await?.is_some())
    }

    async fn get_extent(&self, map_type: MapType, id: &str) -> Result<Option<SpatialExtent>> {
        let maps = self
            .maps
            .read()
            .map_err(|_| Error::map_registry("In-memory registry lock poisoned"))?;
        Ok(maps.get(&(map_type, id.to_string())).copied())
    }
}

/// Accepts every map without knowing its extent
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveMapRegistry;

#[async_trait]
impl MapRegistry for PermissiveMapRegistry {
    async fn exists(&self, _map_type: MapType, _id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn get_extent(&self, _map_type: MapType, _id: &str) -> Result<Option<SpatialExtent>> {
        Ok(None)
    }
}
