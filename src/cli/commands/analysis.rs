//! Temporal analysis commands: topology, granularity and sampling

use super::shared::{end_label, parse_filter, print_json};
use crate::app::models::{DatasetSnapshot, MapEntry, TemporalExtent};
use crate::app::services::granularity::{
    Granularity, combine_granularities, compute_common_granularity,
};
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::app::services::sampling::{TemporalSlot, sample, sample_by_dataset};
use crate::app::services::topology::{
    Relation, TemporalRelation, build_relation_table, relate_all,
};
use crate::cli::args::{GranularityArgs, OutputFormat, SampleArgs, TopologyArgs};
use crate::constants::NO_DATA_MARKER;
use crate::{Error, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Relations between the maps of two snapshots; pairs of a map with itself
/// are left out
pub fn topology_table<'a>(
    first: &'a DatasetSnapshot,
    second: &'a DatasetSnapshot,
    include_disjoint: bool,
) -> Result<Vec<TemporalRelation<'a, MapEntry, MapEntry>>> {
    let table = if include_disjoint {
        relate_all(&first.maps, &second.maps)?
    } else {
        build_relation_table(&first.maps, &second.maps)?
    };
    Ok(table.into_iter().filter(|entry| entry.a.id != entry.b.id).collect())
}

pub fn run_topology(
    args: &TopologyArgs,
    conn: &TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let filter = parse_filter(args.filter.as_deref())?;
    let first_id = conn.qualify(&args.dataset);
    let second_id = conn.qualify(args.other.as_deref().unwrap_or(&args.dataset));
    let snapshots = conn.snapshots(&[first_id, second_id], filter.as_ref())?;
    let (first, second) = (&snapshots[0], &snapshots[1]);

    let table = topology_table(first, second, args.all)?;
    let mut counts: BTreeMap<Relation, usize> = BTreeMap::new();
    for entry in &table {
        *counts.entry(entry.relation).or_default() += 1;
    }
    info!(
        "{} relations between <{}> ({} maps) and <{}> ({} maps)",
        table.len(),
        first.id(),
        first.maps.len(),
        second.id(),
        second.maps.len()
    );

    match format {
        OutputFormat::Human => {
            for entry in &table {
                println!(
                    "{} {} {}",
                    entry.a.id,
                    entry.relation.name().cyan(),
                    entry.b.id
                );
            }
            println!();
            println!("{}", "Relation counts:".bold());
            for (relation, count) in &counts {
                println!("   {:<14} {}", relation.name(), count);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "first": first.id(),
            "second": second.id(),
            "relations": table
                .iter()
                .map(|entry| serde_json::json!({
                    "a": entry.a.id,
                    "relation": entry.relation.name(),
                    "b": entry.b.id,
                }))
                .collect::<Vec<_>>(),
            "counts": counts
                .iter()
                .map(|(relation, count)| (relation.name().to_string(), serde_json::json!(count)))
                .collect::<serde_json::Map<_, _>>(),
        }))?,
        OutputFormat::Csv => {
            println!("a,relation,b");
            for entry in &table {
                println!("{},{},{}", entry.a.id, entry.relation, entry.b.id);
            }
        }
    }
    Ok(())
}

/// Granularity of each snapshot (`None` without enough time stamps) and,
/// for several snapshots, their combination
pub fn dataset_granularities(
    snapshots: &[DatasetSnapshot],
) -> Result<(Vec<Option<Granularity>>, Option<Granularity>)> {
    let mut per_dataset = Vec::with_capacity(snapshots.len());
    let mut range: Option<TemporalExtent> = None;
    for snapshot in snapshots {
        let extents: Vec<TemporalExtent> = snapshot.maps.iter().map(|map| map.extent).collect();
        for extent in &extents {
            range = Some(match range {
                None => *extent,
                Some(current) => current.union(extent)?,
            });
        }
        let granularity = match compute_common_granularity(&extents) {
            Ok(granularity) => Some(granularity),
            Err(Error::Granularity { message }) => {
                debug!("No granularity for <{}>: {}", snapshot.id(), message);
                None
            }
            Err(e) => return Err(e),
        };
        per_dataset.push(granularity);
    }

    let known: Vec<Granularity> = per_dataset.iter().flatten().copied().collect();
    let combined = if snapshots.len() > 1 && !known.is_empty() {
        Some(combine_granularities(&known, range.as_ref())?)
    } else {
        None
    };
    Ok((per_dataset, combined))
}

pub fn run_granularity(
    args: &GranularityArgs,
    conn: &TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let ids: Vec<String> = args.datasets.iter().map(|name| conn.qualify(name)).collect();
    let snapshots = conn.snapshots(&ids, None)?;
    let (per_dataset, combined) = dataset_granularities(&snapshots)?;
    let label = |granularity: &Option<Granularity>| {
        granularity
            .map(|g| g.to_string())
            .unwrap_or_else(|| NO_DATA_MARKER.to_string())
    };

    match format {
        OutputFormat::Human => {
            for (snapshot, granularity) in snapshots.iter().zip(&per_dataset) {
                println!("{:<30} {}", snapshot.id().bold(), label(granularity));
            }
            if let Some(combined) = combined {
                println!("{:<30} {}", "Common granularity".green().bold(), combined);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "datasets": snapshots
                .iter()
                .zip(&per_dataset)
                .map(|(snapshot, granularity)| serde_json::json!({
                    "id": snapshot.id(),
                    "granularity": granularity.map(|g| g.to_string()),
                }))
                .collect::<Vec<_>>(),
            "common": combined.map(|g| g.to_string()),
        }))?,
        OutputFormat::Csv => {
            println!("id,granularity");
            for (snapshot, granularity) in snapshots.iter().zip(&per_dataset) {
                println!("{},{}", snapshot.id(), label(granularity));
            }
        }
    }
    Ok(())
}

/// Sample the input datasets by a sampler dataset or on a regular grid
pub fn sample_datasets(
    args: &SampleArgs,
    conn: &TemporalDatabaseConnection,
) -> Result<Vec<TemporalSlot>> {
    let filter = parse_filter(args.filter.as_deref())?;
    let ids: Vec<String> = args.inputs.names.iter().map(|name| conn.qualify(name)).collect();

    match &args.sampler {
        Some(sampler) => {
            let mut all = vec![conn.qualify(sampler)];
            all.extend(ids);
            let snapshots = conn.snapshots(&all, filter.as_ref())?;
            let (sampler, inputs) = snapshots
                .split_first()
                .ok_or_else(|| Error::invalid_value("Sampling needs a sampler dataset"))?;
            let inputs: Vec<&DatasetSnapshot> = inputs.iter().collect();
            sample_by_dataset(&inputs, sampler, &args.method, args.register_null)
        }
        None => {
            let snapshots = conn.snapshots(&ids, filter.as_ref())?;
            let granularity = match (&args.granularity, snapshots.first()) {
                (Some(text), Some(first)) => Some(Granularity::parse(
                    text,
                    first.dataset.temporal_type,
                    first.dataset.relative_unit,
                )?),
                _ => None,
            };
            let inputs: Vec<&DatasetSnapshot> = snapshots.iter().collect();
            sample(&inputs, &args.method, granularity.as_ref(), args.register_null)
        }
    }
}

fn member_label(maps: Option<&[MapEntry]>) -> String {
    match maps {
        Some(maps) if !maps.is_empty() => maps
            .iter()
            .map(|map| map.id.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => NO_DATA_MARKER.to_string(),
    }
}

/// One line per slot: the sampler map (or slot index), the member ids of
/// every input in order, then the slot's start and end
fn slot_line(slot: &TemporalSlot, ids: &[String], sep: &str) -> String {
    let label = slot
        .sampler
        .as_ref()
        .map_or_else(|| slot.index.to_string(), |map| map.id.clone());
    let mut columns = vec![label];
    columns.extend(ids.iter().map(|id| member_label(slot.members_of(id))));
    columns.push(slot.extent.start().to_string());
    columns.push(end_label(&slot.extent));
    columns.join(sep)
}

pub fn run_sample(
    args: &SampleArgs,
    conn: &TemporalDatabaseConnection,
    format: OutputFormat,
) -> Result<()> {
    let slots = sample_datasets(args, conn)?;
    let ids: Vec<String> = args.inputs.names.iter().map(|name| conn.qualify(name)).collect();
    let sep = args.separator.as_str();

    match format {
        OutputFormat::Human => {
            for slot in &slots {
                println!("{}", slot_line(slot, &ids, sep));
            }
            if slots.is_empty() {
                println!("{}", "No slots".dimmed());
            }
        }
        OutputFormat::Json => print_json(&serde_json::Value::Array(
            slots
                .iter()
                .map(|slot| {
                    let members: serde_json::Map<String, serde_json::Value> = slot
                        .members
                        .iter()
                        .map(|members| {
                            let maps: Vec<&str> =
                                members.maps.iter().map(|map| map.id.as_str()).collect();
                            (members.dataset_id.clone(), serde_json::json!(maps))
                        })
                        .collect();
                    serde_json::json!({
                        "index": slot.index,
                        "start": slot.extent.start().to_string(),
                        "end": slot.extent.end().map(|end| end.to_string()),
                        "sampler": slot.sampler.as_ref().map(|map| map.id.clone()),
                        "members": members,
                    })
                })
                .collect(),
        ))?,
        OutputFormat::Csv => {
            let mut header = vec!["index".to_string(), "start".to_string(), "end".to_string()];
            if args.sampler.is_some() {
                header.push("sampler".to_string());
            }
            header.extend(ids.iter().cloned());
            println!("{}", header.join(sep));

            for slot in &slots {
                let mut row = vec![
                    slot.index.to_string(),
                    slot.extent.start().to_string(),
                    end_label(&slot.extent),
                ];
                if let Some(map) = &slot.sampler {
                    row.push(map.id.clone());
                }
                row.extend(ids.iter().map(|id| member_label(slot.members_of(id))));
                println!("{}", row.join(sep));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{
        DatasetKind, RelativeUnit, SpaceTimeDataset, SpatialExtent, TemporalType, TimeInstant,
    };
    use crate::app::services::sampling::MethodSet;

    fn relative_map(name: &str, start: i64, end: i64) -> MapEntry {
        let extent = TemporalExtent::interval(
            TimeInstant::relative(start, RelativeUnit::Days),
            TimeInstant::relative(end, RelativeUnit::Days),
        )
        .unwrap();
        DatasetKind::Strds.new_map_entry(
            format!("{}@PERMANENT", name),
            extent,
            SpatialExtent::default(),
        )
    }

    fn store() -> TemporalDatabaseConnection {
        let mut conn = TemporalDatabaseConnection::open_in_memory("PERMANENT").unwrap();
        for (name, maps) in [
            ("R", vec![relative_map("r1", 0, 4), relative_map("r2", 4, 8)]),
            ("S", vec![relative_map("s1", 0, 2), relative_map("s2", 6, 8)]),
        ] {
            let id = format!("{}@PERMANENT", name);
            let dataset = SpaceTimeDataset::new(id, DatasetKind::Strds, TemporalType::Relative)
                .with_relative_unit(RelativeUnit::Days);
            conn.create_dataset(&dataset, false).unwrap();
            conn.register_maps(&dataset.id, &maps).unwrap();
        }
        conn
    }

    fn sample_args(inputs: &str, sampler: Option<&str>, method: &str) -> SampleArgs {
        SampleArgs {
            inputs: inputs.parse().unwrap(),
            sampler: sampler.map(str::to_string),
            method: MethodSet::parse(method).unwrap(),
            filter: None,
            granularity: None,
            register_null: false,
            separator: "|".to_string(),
        }
    }

    #[test]
    fn test_topology_table_skips_self_pairs() {
        let conn = store();
        let r = conn.snapshot("R@PERMANENT", None).unwrap();
        let table = topology_table(&r, &r, false).unwrap();
        let relations: Vec<(&str, Relation)> =
            table.iter().map(|e| (e.a.id.as_str(), e.relation)).collect();
        assert_eq!(
            relations,
            vec![("r1@PERMANENT", Relation::Meets), ("r2@PERMANENT", Relation::MetBy)]
        );

        let s = conn.snapshot("S@PERMANENT", None).unwrap();
        let table = topology_table(&r, &s, true).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table[1].relation, Relation::Precedes);
    }

    #[test]
    fn test_granularities_are_combined() {
        let conn = store();
        let snapshots = conn
            .snapshots(&["R@PERMANENT".to_string(), "S@PERMANENT".to_string()], None)
            .unwrap();
        let (per_dataset, combined) = dataset_granularities(&snapshots).unwrap();
        assert_eq!(per_dataset[0].unwrap().to_string(), "4");
        assert_eq!(per_dataset[1].unwrap().to_string(), "2");
        assert_eq!(combined.unwrap().to_string(), "2");
    }

    #[test]
    fn test_sample_by_sampler_dataset() {
        let conn = store();
        let slots = sample_datasets(&sample_args("S", Some("R"), "during"), &conn).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].sampler.as_ref().unwrap().id, "r1@PERMANENT");
        assert_eq!(member_label(slots[0].members_of("S@PERMANENT")), "s1@PERMANENT");
        assert_eq!(member_label(slots[1].members_of("S@PERMANENT")), "s2@PERMANENT");

        let ids = vec!["S@PERMANENT".to_string()];
        let extent = &slots[0].extent;
        assert_eq!(
            slot_line(&slots[0], &ids, "|"),
            format!(
                "r1@PERMANENT|s1@PERMANENT|{}|{}",
                extent.start(),
                end_label(extent)
            )
        );
    }

    #[test]
    fn test_sample_on_grid() {
        let conn = store();
        let mut args = sample_args("R,S", None, "contains,equal");
        args.register_null = true;
        let slots = sample_datasets(&args, &conn).unwrap();
        // Granularity 2 over [0, 8)
        assert_eq!(slots.len(), 4);
        assert_eq!(member_label(slots[1].members_of("S@PERMANENT")), "None");
        assert_eq!(member_label(slots[1].members_of("R@PERMANENT")), "r1@PERMANENT");
        assert_eq!(member_label(slots[3].members_of("S@PERMANENT")), "s2@PERMANENT");

        // s1 and s2 only start or finish the coarser slots
        args.granularity = Some("4".to_string());
        args.register_null = false;
        let slots = sample_datasets(&args, &conn).unwrap();
        assert!(slots.is_empty());
    }
}
