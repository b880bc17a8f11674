//! Map registration commands
//!
//! Maps are stamped either from their own line in a map file
//! (`name|start|end`) or sequentially from `--start` by `--increment`, with
//! `--interval` turning the time points into intervals that end where the
//! next map starts.

use super::shared::print_json;
use crate::app::adapters::map_registry::MapRegistry;
use crate::app::models::{
    Increment, MapEntry, RelativeUnit, SpaceTimeDataset, SpatialExtent, TemporalExtent, TimeInstant,
};
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::cli::args::{OutputFormat, RegisterArgs, UnregisterArgs};
use crate::{Error, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, info, warn};

/// One line of a map file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLine {
    pub name: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl MapLine {
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            end: None,
        }
    }
}

/// Parse `name[SEP start[SEP end]]` lines; blank lines and `#` comments are skipped
pub fn parse_map_file(text: &str, separator: &str) -> Result<Vec<MapLine>> {
    let mut lines = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
        if fields.len() > 3 || fields[0].is_empty() {
            return Err(Error::invalid_value(format!(
                "Line {}: expected name[{sep}start[{sep}end]], got '{}'",
                number + 1,
                line,
                sep = separator
            )));
        }
        let field = |i: usize| {
            fields
                .get(i)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        };
        lines.push(MapLine {
            name: fields[0].to_string(),
            start: field(1),
            end: field(2),
        });
    }
    Ok(lines)
}

/// Read and parse a map file
pub fn read_map_file(path: &Path, separator: &str) -> Result<Vec<MapLine>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read map file {}", path.display()), e))?;
    parse_map_file(&text, separator)
}

/// Sequential time stamping from a start time
#[derive(Debug, Clone, Default)]
pub struct Stamping<'a> {
    pub start: Option<&'a str>,
    pub increment: Option<&'a str>,
    pub interval: bool,
}

/// Time stamp every line for `dataset`.
///
/// Lines carrying their own start time keep it. The others are stamped from
/// `stamping.start`, advanced by one increment per position in the list.
pub fn stamp_maps(
    lines: &[MapLine],
    dataset: &SpaceTimeDataset,
    stamping: &Stamping<'_>,
) -> Result<Vec<(String, TemporalExtent)>> {
    let unit = dataset.relative_unit.unwrap_or(RelativeUnit::Untyped);
    let parse = |text: &str| TimeInstant::parse(text, dataset.temporal_type, unit);

    let base = stamping.start.map(parse).transpose()?;
    let increment = stamping
        .increment
        .map(str::parse::<Increment>)
        .transpose()?;
    if increment.is_some_and(|inc| inc.is_zero()) {
        return Err(Error::invalid_value("Increment must not be zero"));
    }
    if stamping.interval && increment.is_none() {
        return Err(Error::invalid_value("Interval stamping needs an increment"));
    }

    let mut stamped = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let extent = match (&line.start, base) {
            (Some(start), _) => {
                let end = line.end.as_deref().map(parse).transpose()?;
                TemporalExtent::new(parse(start)?, end)?
            }
            (None, Some(base)) => {
                let offset = position as i64;
                match increment {
                    Some(step) => {
                        let start = base.incremented_by(&step.scaled(offset)?)?;
                        if stamping.interval {
                            let end = base.incremented_by(&step.scaled(offset + 1)?)?;
                            TemporalExtent::interval(start, end)?
                        } else {
                            TemporalExtent::point(start)
                        }
                    }
                    None => TemporalExtent::point(base),
                }
            }
            (None, None) => {
                return Err(Error::invalid_value(format!(
                    "Map <{}> has no time stamp; give one in the map file or use --start",
                    line.name
                )));
            }
        };
        stamped.push((line.name.clone(), extent));
    }
    Ok(stamped)
}

/// Spatial extent of a map, failing if the registry does not know the map
async fn lookup_extent(registry: &dyn MapRegistry, map: &MapEntry) -> Result<SpatialExtent> {
    if let Some(extent) = registry.get_extent(map.map_type, &map.id).await? {
        return Ok(extent);
    }
    if registry.exists(map.map_type, &map.id).await? {
        debug!("No extent known for <{}>", map.id);
        return Ok(SpatialExtent::default());
    }
    Err(Error::registration(format!(
        "{} map <{}> not found",
        map.map_type, map.id
    )))
}

fn lookup_progress(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} maps | {msg}")
        .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("checking maps");
    pb
}

pub async fn run_register(
    args: &RegisterArgs,
    conn: &mut TemporalDatabaseConnection,
    registry: &dyn MapRegistry,
    format: OutputFormat,
    show_progress: bool,
) -> Result<()> {
    let dataset = conn.get_dataset(&conn.qualify(&args.dataset))?;

    let lines = match (&args.maps, &args.file) {
        (Some(list), _) => list.names.iter().map(MapLine::name_only).collect(),
        (None, Some(file)) => read_map_file(file, &args.separator)?,
        (None, None) => return Err(Error::configuration("Either --maps or --file is required")),
    };
    if lines.is_empty() {
        warn!("No maps to register in <{}>", dataset.id);
        return Ok(());
    }

    let stamping = Stamping {
        start: args.start.as_deref(),
        increment: args.increment.as_deref(),
        interval: args.interval,
    };
    let stamped = stamp_maps(&lines, &dataset, &stamping)?;

    let progress = lookup_progress(stamped.len(), show_progress);
    let mut maps = Vec::with_capacity(stamped.len());
    for (name, extent) in stamped {
        let mut map = dataset
            .kind
            .new_map_entry(conn.qualify(&name), extent, SpatialExtent::default());
        map.spatial_extent = match lookup_extent(registry, &map).await {
            Ok(spatial) => spatial,
            Err(e) => {
                progress.abandon_with_message(format!("<{}> failed", map.id));
                return Err(e);
            }
        };
        progress.inc(1);
        maps.push(map);
    }
    progress.finish_and_clear();

    let registered = conn.register_maps(&dataset.id, &maps)?;
    info!("Registered {} maps in <{}>", registered, dataset.id);

    match format {
        OutputFormat::Human => println!(
            "{} {} maps in <{}>",
            "Registered".green().bold(),
            registered,
            dataset.id
        ),
        OutputFormat::Json => print_json(&serde_json::json!({
            "dataset": dataset.id,
            "registered": maps.iter().map(|map| map.id.as_str()).collect::<Vec<_>>(),
        }))?,
        OutputFormat::Csv => {
            for map in &maps {
                println!("{}", map.id);
            }
        }
    }
    Ok(())
}

pub fn run_unregister(
    args: &UnregisterArgs,
    conn: &mut TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let dataset_id = conn.qualify(&args.dataset);
    let map_ids: Vec<String> = args.maps.names.iter().map(|name| conn.qualify(name)).collect();
    let removed = conn.unregister_maps(&dataset_id, &map_ids)?;

    match format {
        OutputFormat::Human => println!(
            "{} {} maps from <{}>",
            "Unregistered".yellow().bold(),
            removed,
            dataset_id
        ),
        OutputFormat::Json => print_json(&serde_json::json!({
            "dataset": dataset_id,
            "unregistered": map_ids,
        }))?,
        OutputFormat::Csv => {
            for id in &map_ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::map_registry::{InMemoryMapRegistry, PermissiveMapRegistry};
    use crate::app::models::{DatasetKind, MapType, TemporalType};
    use crate::cli::args::NameList;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn absolute() -> SpaceTimeDataset {
        SpaceTimeDataset::new("A@PERMANENT", DatasetKind::Strds, TemporalType::Absolute)
    }

    fn names(count: usize) -> Vec<MapLine> {
        (1..=count).map(|i| MapLine::name_only(format!("a{}", i))).collect()
    }

    fn register_args(maps: &str) -> RegisterArgs {
        RegisterArgs {
            dataset: "A".to_string(),
            maps: Some(maps.parse::<NameList>().unwrap()),
            file: None,
            separator: "|".to_string(),
            start: Some("2001-01-01".to_string()),
            increment: Some("1 month".to_string()),
            interval: true,
        }
    }

    #[test]
    fn test_parse_map_file() {
        let text = "# maps\na1|2001-01-01|2001-02-01\n\na2 | 2001-02-01\na3\n";
        let lines = parse_map_file(text, "|").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].end.as_deref(), Some("2001-02-01"));
        assert_eq!(lines[1].start.as_deref(), Some("2001-02-01"));
        assert!(lines[1].end.is_none());
        assert_eq!(lines[2], MapLine::name_only("a3"));

        assert!(parse_map_file("a1|1|2|3", "|").is_err());
        assert!(parse_map_file("|2001-01-01", "|").is_err());
        assert_eq!(parse_map_file("a1,5,7", ",").unwrap()[0].start.as_deref(), Some("5"));
    }

    #[test]
    fn test_sequential_interval_stamping() {
        let stamping = Stamping {
            start: Some("2001-01-01"),
            increment: Some("1 month"),
            interval: true,
        };
        let stamped = stamp_maps(&names(3), &absolute(), &stamping).unwrap();
        let labels: Vec<String> = stamped.iter().map(|(_, extent)| extent.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "2001-01-01 00:00:00 - 2001-02-01 00:00:00",
                "2001-02-01 00:00:00 - 2001-03-01 00:00:00",
                "2001-03-01 00:00:00 - 2001-04-01 00:00:00",
            ]
        );
    }

    #[test]
    fn test_sequential_point_stamping() {
        let dataset =
            SpaceTimeDataset::new("R@PERMANENT", DatasetKind::Strds, TemporalType::Relative)
                .with_relative_unit(RelativeUnit::Days);
        let stamping = Stamping {
            start: Some("10"),
            increment: Some("5"),
            interval: false,
        };
        let stamped = stamp_maps(&names(3), &dataset, &stamping).unwrap();
        let starts: Vec<i64> = stamped.iter().map(|(_, e)| e.start_ordinal()).collect();
        assert_eq!(starts, vec![10, 15, 20]);
        assert!(stamped.iter().all(|(_, e)| e.is_point()));

        // A calendar increment cannot advance relative time
        let stamping = Stamping {
            start: Some("10"),
            increment: Some("1 day"),
            interval: false,
        };
        assert!(matches!(
            stamp_maps(&names(2), &dataset, &stamping),
            Err(Error::TemporalTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_stamping_errors() {
        assert!(stamp_maps(&names(1), &absolute(), &Stamping::default()).is_err());

        let zero = Stamping {
            start: Some("2001-01-01"),
            increment: Some("0 days"),
            interval: true,
        };
        assert!(stamp_maps(&names(1), &absolute(), &zero).is_err());

        let own = vec![MapLine {
            name: "a1".to_string(),
            start: Some("2001-02-01".to_string()),
            end: Some("2001-01-01".to_string()),
        }];
        assert!(matches!(
            stamp_maps(&own, &absolute(), &Stamping::default()),
            Err(Error::InvalidExtent { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_uses_registry_extents() {
        let mut conn = TemporalDatabaseConnection::open_in_memory("PERMANENT").unwrap();
        conn.create_dataset(&absolute(), false).unwrap();
        let extent = SpatialExtent::new_2d(10.0, 0.0, 10.0, 0.0);
        let registry = InMemoryMapRegistry::new()
            .with_map(MapType::Raster, "a1@PERMANENT", extent)
            .with_map(MapType::Raster, "a2@PERMANENT", extent);

        run_register(&register_args("a1,a2"), &mut conn, &registry, OutputFormat::Csv, false)
            .await
            .unwrap();
        let maps = conn.list_maps("A@PERMANENT", None).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1].spatial_extent, extent);

        // Unknown maps are rejected and nothing is registered
        let args = register_args("a3");
        let result = run_register(&args, &mut conn, &registry, OutputFormat::Csv, false).await;
        assert!(matches!(result, Err(Error::Registration { .. })));
        assert_eq!(conn.list_maps("A@PERMANENT", None).unwrap().len(), 2);

        let unregister = UnregisterArgs {
            dataset: "A".to_string(),
            maps: "a1".parse().unwrap(),
        };
        run_unregister(&unregister, &mut conn, OutputFormat::Csv).unwrap();
        assert_eq!(conn.get_dataset("A@PERMANENT").unwrap().aggregate.map_count, 1);
    }

    #[tokio::test]
    async fn test_register_from_file() {
        let mut conn = TemporalDatabaseConnection::open_in_memory("PERMANENT").unwrap();
        conn.create_dataset(&absolute(), false).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a1|2001-01-01|2001-01-02").unwrap();
        writeln!(file, "a2|2001-01-02|2001-01-03").unwrap();

        let args = RegisterArgs {
            dataset: "A".to_string(),
            maps: None,
            file: Some(file.path().to_path_buf()),
            separator: "|".to_string(),
            start: None,
            increment: None,
            interval: false,
        };
        run_register(&args, &mut conn, &PermissiveMapRegistry, OutputFormat::Json, false)
            .await
            .unwrap();

        let dataset = conn.get_dataset("A@PERMANENT").unwrap();
        assert_eq!(dataset.aggregate.map_count, 2);
        assert_eq!(dataset.aggregate.granularity.as_deref(), Some("1 day"));
    }
}
