//! Assignment of dataset maps to sampling slots

use super::grid::build_slot_grid;
use super::method::MethodSet;
use crate::app::models::{DatasetSnapshot, MapEntry, Temporal, TemporalExtent};
use crate::app::services::granularity::{Granularity, compute_common_granularity};
use crate::app::services::topology::{build_relation_table, relate_all};
use crate::{Error, Result};
use tracing::{debug, info};

/// Maps of one dataset that take part in a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotMembers {
    pub dataset_id: String,
    /// Ordered by start time, then id; empty means no data
    pub maps: Vec<MapEntry>,
}

/// One output time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSlot {
    /// Position on the slot grid; kept when other slots are dropped
    pub index: usize,
    pub extent: TemporalExtent,
    /// Map defining the slot when sampling by another dataset
    pub sampler: Option<MapEntry>,
    /// One entry per input dataset, in input order
    pub members: Vec<SlotMembers>,
}

impl TemporalSlot {
    pub fn members_of(&self, dataset_id: &str) -> Option<&[MapEntry]> {
        self.members
            .iter()
            .find(|members| members.dataset_id == dataset_id)
            .map(|members| members.maps.as_slice())
    }

    /// True if every dataset has at least one map in the slot
    pub fn is_complete(&self) -> bool {
        self.members.iter().all(|members| !members.maps.is_empty())
    }

    /// Datasets without maps in this slot
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|members| members.maps.is_empty())
            .map(|members| members.dataset_id.as_str())
    }
}

impl Temporal for TemporalSlot {
    fn temporal_extent(&self) -> &TemporalExtent {
        &self.extent
    }
}

/// Slot extent paired with its grid position, for relation tables
struct Frame {
    index: usize,
    extent: TemporalExtent,
}

impl Temporal for Frame {
    fn temporal_extent(&self) -> &TemporalExtent {
        &self.extent
    }
}

fn check_datasets(datasets: &[&DatasetSnapshot]) -> Result<()> {
    let first = datasets
        .first()
        .ok_or_else(|| Error::invalid_value("Sampling needs at least one space time dataset"))?;
    for snapshot in &datasets[1..] {
        let (a, b) = (&first.dataset, &snapshot.dataset);
        if a.temporal_type != b.temporal_type || a.relative_unit != b.relative_unit {
            return Err(Error::type_mismatch(
                format!("{} time in <{}>", a.temporal_type, a.id),
                format!("{} time in <{}>", b.temporal_type, b.id),
            ));
        }
    }
    Ok(())
}

/// For every frame, the maps of `snapshot` accepted by `methods`, ordered by
/// start time then id
fn assign(
    snapshot: &DatasetSnapshot,
    frames: &[Frame],
    methods: &MethodSet,
) -> Result<Vec<Vec<MapEntry>>> {
    let table = if methods.needs_disjoint_pairs() {
        relate_all(&snapshot.maps, frames)?
    } else {
        build_relation_table(&snapshot.maps, frames)?
    };

    let mut assigned: Vec<Vec<MapEntry>> = vec![Vec::new(); frames.len()];
    for entry in table {
        if methods.accepts(entry.relation) {
            assigned[entry.b.index].push(entry.a.clone());
        }
    }
    for maps in &mut assigned {
        maps.sort_by(MapEntry::order);
    }
    Ok(assigned)
}

fn collect_slots(
    datasets: &[&DatasetSnapshot],
    frames: Vec<Frame>,
    samplers: Option<Vec<MapEntry>>,
    methods: &MethodSet,
    register_null: bool,
) -> Result<Vec<TemporalSlot>> {
    let mut per_dataset = Vec::with_capacity(datasets.len());
    for snapshot in datasets {
        per_dataset.push(assign(snapshot, &frames, methods)?);
    }

    let mut samplers = samplers.map(Vec::into_iter);
    let mut slots = Vec::with_capacity(frames.len());
    let mut dropped = 0usize;
    for frame in frames {
        let members: Vec<SlotMembers> = datasets
            .iter()
            .zip(per_dataset.iter_mut())
            .map(|(snapshot, assigned)| SlotMembers {
                dataset_id: snapshot.id().to_string(),
                maps: std::mem::take(&mut assigned[frame.index]),
            })
            .collect();
        let slot = TemporalSlot {
            index: frame.index,
            extent: frame.extent,
            sampler: samplers.as_mut().and_then(Iterator::next),
            members,
        };
        if register_null || slot.is_complete() {
            slots.push(slot);
        } else {
            debug!(
                "Dropping slot {} ({}): no maps in {}",
                slot.index,
                slot.extent,
                slot.missing().collect::<Vec<_>>().join(", ")
            );
            dropped += 1;
        }
    }

    info!(
        "Sampled {} dataset(s) with method {}: {} slots kept, {} dropped",
        datasets.len(),
        methods,
        slots.len(),
        dropped
    );
    Ok(slots)
}

/// Partition the time line spanned by `datasets` into slots of one granule and
/// select, per slot and dataset, the maps related to the slot by `methods`.
///
/// The granularity is derived from all member extents unless given. Slots
/// where a dataset has no map are dropped unless `register_null` is set, in
/// which case their member list for that dataset is empty.
pub fn sample(
    datasets: &[&DatasetSnapshot],
    methods: &MethodSet,
    granularity: Option<&Granularity>,
    register_null: bool,
) -> Result<Vec<TemporalSlot>> {
    check_datasets(datasets)?;

    let extents: Vec<TemporalExtent> = datasets
        .iter()
        .flat_map(|snapshot| snapshot.maps.iter().map(|map| map.extent))
        .collect();
    if extents.is_empty() {
        debug!("No maps registered in the sampled datasets");
        return Ok(Vec::new());
    }

    let granularity = match granularity {
        Some(granularity) => *granularity,
        None => compute_common_granularity(&extents)?,
    };
    debug!("Sampling grid granularity: {}", granularity);

    let frames: Vec<Frame> = build_slot_grid(&extents, &granularity)?
        .into_iter()
        .enumerate()
        .map(|(index, extent)| Frame { index, extent })
        .collect();

    collect_slots(datasets, frames, None, methods, register_null)
}

/// Slots defined by the maps of `sampler`, each carrying its sampler map.
///
/// This is the classic sampling of one dataset by another: the slot grid is
/// the sampler's own sequence of extents rather than a regular granule grid.
pub fn sample_by_dataset(
    inputs: &[&DatasetSnapshot],
    sampler: &DatasetSnapshot,
    methods: &MethodSet,
    register_null: bool,
) -> Result<Vec<TemporalSlot>> {
    let mut all: Vec<&DatasetSnapshot> = Vec::with_capacity(inputs.len() + 1);
    all.push(sampler);
    all.extend_from_slice(inputs);
    check_datasets(&all)?;
    if inputs.is_empty() {
        return Err(Error::invalid_value("Sampling needs at least one input dataset"));
    }

    let frames: Vec<Frame> = sampler
        .maps
        .iter()
        .enumerate()
        .map(|(index, map)| Frame {
            index,
            extent: map.extent,
        })
        .collect();

    collect_slots(
        inputs,
        frames,
        Some(sampler.maps.clone()),
        methods,
        register_null,
    )
}
