//! Shared components for CLI commands
//!
//! This module contains the setup used by every subcommand: logging,
//! layered configuration, opening the metadata store and choosing the map
//! registry, plus small output helpers.

use crate::app::adapters::map_registry::{CommandMapRegistry, MapRegistry, PermissiveMapRegistry};
use crate::app::models::{MapEntry, TemporalExtent};
use crate::app::services::metadata_store::{MapFilter, TemporalDatabaseConnection};
use crate::cli::args::{Args, Commands};
use crate::config::{Config, LoggingConfig};
use crate::constants::NO_DATA_MARKER;
use crate::{Error, Result};
use tracing::{debug, info};

/// Set up structured logging on stderr.
///
/// `RUST_LOG` wins over the configured level, which `-v`/`-q` have already
/// overridden.
pub fn setup_logging(args: &Args, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = logging.level.as_str();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tgis={}", log_level)));

    let initialized = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    initialized
        .map_err(|e| Error::configuration(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load configuration using the layered approach (defaults -> file -> env -> args)
pub fn load_configuration(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config_file.as_deref())?;
    apply_cli_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(database) = &args.database {
        config.database.path = Some(database.clone());
    }
    if let Some(mapset) = &args.mapset {
        config.session.mapset = mapset.clone();
    }

    if let Some(Commands::Algebra(algebra)) = &args.command {
        if let Some(nprocs) = algebra.nprocs {
            config.compute.nprocs = nprocs;
        }
        if algebra.skip_failures {
            config.compute.skip_failures = true;
        }
    }

    if args.quiet || args.verbose > 0 {
        config.logging.level = args.get_log_level().to_string();
    }
}

/// Open the configured metadata store for the configured mapset
pub fn open_database(config: &Config) -> Result<TemporalDatabaseConnection> {
    let path = config.database_path()?;
    info!("Using metadata store {}", path.display());
    TemporalDatabaseConnection::open(&path, config.session.mapset.clone())
}

/// The map registry selected by `registry.check_maps`
pub fn map_registry(config: &Config) -> Box<dyn MapRegistry> {
    if config.registry.check_maps {
        Box::new(CommandMapRegistry::new(&config.registry))
    } else {
        debug!("Map checks disabled; map extents are not looked up");
        Box::new(PermissiveMapRegistry)
    }
}

/// Parse an optional `--where` condition
pub fn parse_filter(filter: Option<&str>) -> Result<Option<MapFilter>> {
    filter
        .map(MapFilter::parse)
        .transpose()
        .map(|parsed| parsed.filter(|f| !f.is_empty()))
}

/// End time as printed in listings; time points have none
pub fn end_label(extent: &TemporalExtent) -> String {
    extent
        .end()
        .map_or_else(|| NO_DATA_MARKER.to_string(), |end| end.to_string())
}

/// One map as a JSON object
pub fn map_json(map: &MapEntry) -> serde_json::Value {
    serde_json::json!({
        "id": map.id,
        "type": map.map_type.as_str(),
        "start": map.extent.start().to_string(),
        "end": map.extent.end().map(|end| end.to_string()),
        "north": map.spatial_extent.north,
        "south": map.spatial_extent.south,
        "east": map.spatial_extent.east,
        "west": map.spatial_extent.west,
        "top": map.spatial_extent.top,
        "bottom": map.spatial_extent.bottom,
    })
}

/// Print a JSON document to stdout
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Error::invalid_value(format!("Failed to serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
