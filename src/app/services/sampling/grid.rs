//! Slot grids spanning a set of maps

use crate::app::models::{Increment, TemporalExtent, TimeInstant};
use crate::app::services::granularity::Granularity;
use crate::constants::MAX_SAMPLE_SLOTS;
use crate::{Error, Result};

/// Extents of consecutive slots of one granule each, covering the union of
/// `extents`.
///
/// Every slot start is computed from the epoch by a scaled increment, so month
/// clamping never drifts (Jan 31, Feb 28, Mar 31, ...). When every extent is a
/// point the slots are points on the grid, including the union end.
pub fn build_slot_grid(
    extents: &[TemporalExtent],
    granularity: &Granularity,
) -> Result<Vec<TemporalExtent>> {
    let Some(first) = extents.first() else {
        return Ok(Vec::new());
    };
    if granularity.value <= 0 {
        return Err(Error::granularity(format!(
            "Granularity must be positive, got {}",
            granularity
        )));
    }
    if granularity.temporal_type() != first.temporal_type() {
        return Err(Error::type_mismatch(
            first.start().kind_label(),
            format!("{} granularity {}", granularity.temporal_type(), granularity),
        ));
    }

    let mut union = *first;
    for extent in &extents[1..] {
        union = union.union(extent)?;
    }
    let all_points = extents.iter().all(TemporalExtent::is_point);
    let point_at_end = extents
        .iter()
        .any(|extent| extent.is_point() && extent.start_ordinal() == union.end_ordinal());

    let epoch = *union.start();
    let step = granularity.to_increment();
    let end = union.end_ordinal();

    let mut slots = Vec::new();
    for index in 0.. {
        if slots.len() >= MAX_SAMPLE_SLOTS {
            return Err(Error::granularity(format!(
                "Granularity {} splits {} into more than {} slots",
                granularity, union, MAX_SAMPLE_SLOTS
            )));
        }
        let start = offset(&epoch, &step, index)?;
        let keep =
            start.ordinal() < end || (start.ordinal() == end && (all_points || point_at_end));
        if !keep {
            break;
        }
        if all_points {
            slots.push(TemporalExtent::point(start));
        } else {
            let slot_end = offset(&epoch, &step, index + 1)?;
            slots.push(TemporalExtent::interval(start, slot_end)?);
        }
    }
    Ok(slots)
}

fn offset(epoch: &TimeInstant, step: &Increment, index: i64) -> Result<TimeInstant> {
    epoch.incremented_by(&step.scaled(index)?)
}
