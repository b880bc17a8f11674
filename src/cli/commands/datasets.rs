//! Dataset management commands: create, remove, list and info

use super::shared::{end_label, map_json, parse_filter, print_json};
use crate::app::models::{MapEntry, RelativeUnit, SpaceTimeDataset, TemporalType};
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::cli::args::{CreateArgs, InfoArgs, ListArgs, OutputFormat, RemoveArgs};
use crate::{Error, Result};
use colored::Colorize;
use tracing::{debug, info};

/// Build the dataset described by the create arguments
pub fn dataset_from_args(
    args: &CreateArgs,
    conn: &TemporalDatabaseConnection,
) -> Result<SpaceTimeDataset> {
    let id = conn.qualify(&args.dataset);
    let mut dataset = SpaceTimeDataset::new(id, args.kind, args.temporal_type)
        .with_title(args.title.clone())
        .with_description(args.description.clone())
        .with_semantic_type(args.semantic_type);

    match (args.temporal_type, args.unit) {
        (TemporalType::Absolute, Some(unit)) => {
            return Err(Error::configuration(format!(
                "--unit {} only applies to relative datasets",
                unit
            )));
        }
        (TemporalType::Relative, unit) => {
            dataset = dataset.with_relative_unit(unit.unwrap_or(RelativeUnit::Untyped));
        }
        (TemporalType::Absolute, None) => {}
    }
    Ok(dataset)
}

pub fn run_create(
    args: &CreateArgs,
    conn: &mut TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let dataset = dataset_from_args(args, conn)?;
    debug!("Creating dataset: {:?}", dataset);
    conn.create_dataset(&dataset, args.overwrite)?;

    match format {
        OutputFormat::Human => println!(
            "{} {} <{}>",
            "Created".green().bold(),
            dataset.kind,
            dataset.id
        ),
        OutputFormat::Json => print_json(&serde_json::json!({ "created": dataset.id }))?,
        OutputFormat::Csv => println!("{}", dataset.id),
    }
    Ok(())
}

pub fn run_remove(
    args: &RemoveArgs,
    conn: &mut TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let mut removed = Vec::with_capacity(args.datasets.len());
    for name in &args.datasets {
        let id = conn.qualify(name);
        let detached = conn.remove_dataset(&id)?;
        info!("Removed <{}> ({} maps detached)", id, detached);
        removed.push((id, detached));
    }

    match format {
        OutputFormat::Human => {
            for (id, detached) in &removed {
                println!("{} <{}> ({} maps detached)", "Removed".yellow().bold(), id, detached);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "removed": removed
                .iter()
                .map(|(id, detached)| serde_json::json!({ "id": id, "detached_maps": detached }))
                .collect::<Vec<_>>()
        }))?,
        OutputFormat::Csv => {
            for (id, detached) in &removed {
                println!("{},{}", id, detached);
            }
        }
    }
    Ok(())
}

pub fn run_list(
    args: &ListArgs,
    conn: &TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    match &args.dataset {
        Some(name) => {
            let id = conn.qualify(name);
            let filter = parse_filter(args.filter.as_deref())?;
            let maps = conn.list_maps(&id, filter.as_ref())?;
            info!("Listing {} maps of <{}>", maps.len(), id);
            print_maps(&maps, format, &args.separator)
        }
        None => {
            let datasets = conn.list_datasets(args.kind)?;
            print_datasets(&datasets, format, &args.separator)
        }
    }
}

fn print_maps(maps: &[MapEntry], format: OutputFormat, separator: &str) -> Result<()> {
    match format {
        OutputFormat::Human => {
            if maps.is_empty() {
                println!("{}", "No maps registered".dimmed());
            }
            for map in maps {
                println!(
                    "{}  {}  {}",
                    map.id.bold(),
                    map.extent.start(),
                    end_label(&map.extent)
                );
            }
        }
        OutputFormat::Json => print_json(&serde_json::Value::Array(
            maps.iter().map(map_json).collect(),
        ))?,
        OutputFormat::Csv => {
            let header = ["id", "start_time", "end_time", "north", "south", "east", "west"];
            println!("{}", header.join(separator));
            for map in maps {
                let spatial = &map.spatial_extent;
                let row = [
                    map.id.clone(),
                    map.extent.start().to_string(),
                    end_label(&map.extent),
                    spatial.north.to_string(),
                    spatial.south.to_string(),
                    spatial.east.to_string(),
                    spatial.west.to_string(),
                ];
                println!("{}", row.join(separator));
            }
        }
    }
    Ok(())
}

fn print_datasets(
    datasets: &[SpaceTimeDataset],
    format: OutputFormat,
    separator: &str,
) -> Result<()> {
    match format {
        OutputFormat::Human => {
            if datasets.is_empty() {
                println!("{}", "No space-time datasets".dimmed());
            }
            for dataset in datasets {
                println!(
                    "{:<30} {:<7} {:<9} {:>6} maps",
                    dataset.id.bold(),
                    dataset.kind.as_str(),
                    dataset.temporal_type.as_str(),
                    dataset.aggregate.map_count
                );
            }
        }
        OutputFormat::Json => print_json(&serde_json::Value::Array(
            datasets.iter().map(dataset_json).collect(),
        ))?,
        OutputFormat::Csv => {
            let header = ["id", "kind", "temporal_type", "map_count", "start_time", "end_time"];
            println!("{}", header.join(separator));
            for dataset in datasets {
                let (start, end) = extent_labels(dataset);
                let row = [
                    dataset.id.clone(),
                    dataset.kind.to_string(),
                    dataset.temporal_type.to_string(),
                    dataset.aggregate.map_count.to_string(),
                    start,
                    end,
                ];
                println!("{}", row.join(separator));
            }
        }
    }
    Ok(())
}

fn extent_labels(dataset: &SpaceTimeDataset) -> (String, String) {
    match &dataset.aggregate.extent {
        Some(extent) => (extent.start().to_string(), end_label(extent)),
        None => (String::new(), String::new()),
    }
}

fn dataset_json(dataset: &SpaceTimeDataset) -> serde_json::Value {
    let extent = dataset.aggregate.extent.as_ref();
    serde_json::json!({
        "id": dataset.id,
        "kind": dataset.kind.as_str(),
        "temporal_type": dataset.temporal_type.as_str(),
        "relative_unit": dataset.relative_unit.map(|unit| unit.as_str()),
        "semantic_type": dataset.semantic_type.as_str(),
        "title": dataset.title,
        "description": dataset.description,
        "map_count": dataset.aggregate.map_count,
        "start": extent.map(|e| e.start().to_string()),
        "end": extent.and_then(|e| e.end()).map(|end| end.to_string()),
        "granularity": dataset.aggregate.granularity,
    })
}

pub fn run_info(
    args: &InfoArgs,
    conn: &TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let dataset = conn.get_dataset(&conn.qualify(&args.dataset))?;

    match format {
        OutputFormat::Human => {
            let (start, end) = extent_labels(&dataset);
            println!("{}", format!("Space-time dataset <{}>", dataset.id).bold());
            println!("   Kind:          {}", dataset.kind);
            println!("   Temporal type: {}", dataset.temporal_type);
            if let Some(unit) = dataset.relative_unit {
                println!("   Relative unit: {}", unit);
            }
            println!("   Semantic type: {}", dataset.semantic_type.as_str());
            println!("   Title:         {}", dataset.title);
            if !dataset.description.is_empty() {
                println!("   Description:   {}", dataset.description);
            }
            println!("   Maps:          {}", dataset.aggregate.map_count);
            println!("   Start time:    {}", start);
            println!("   End time:      {}", end);
            println!(
                "   Granularity:   {}",
                dataset.aggregate.granularity.as_deref().unwrap_or("None")
            );
        }
        OutputFormat::Json => print_json(&dataset_json(&dataset))?,
        OutputFormat::Csv => {
            let (start, end) = extent_labels(&dataset);
            println!("id={}", dataset.id);
            println!("kind={}", dataset.kind);
            println!("temporal_type={}", dataset.temporal_type);
            println!("map_count={}", dataset.aggregate.map_count);
            println!("start_time={}", start);
            println!("end_time={}", end);
            println!(
                "granularity={}",
                dataset.aggregate.granularity.as_deref().unwrap_or("None")
            );
        }
    }
    Ok(())
}
