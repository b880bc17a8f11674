//! Granularity computation and validation

use super::{Granularity, GranularityUnit, gcd};
use crate::app::models::{AbsoluteTime, RelativeUnit, TemporalExtent, TimeInstant};
use crate::{Error, Result};
use tracing::debug;

/// Distinct boundary instants of all extents, sorted along the time line
fn boundaries(extents: &[TemporalExtent]) -> Result<Vec<TimeInstant>> {
    let first = extents
        .first()
        .ok_or_else(|| Error::granularity("Cannot compute a granularity without maps"))?;

    let mut instants = Vec::with_capacity(extents.len() * 2);
    for extent in extents {
        first.check_compatible(extent)?;
        instants.push(*extent.start());
        if let Some(end) = extent.end() {
            instants.push(*end);
        }
    }
    instants.sort_by_key(TimeInstant::ordinal);
    instants.dedup_by_key(|instant| instant.ordinal());

    if instants.len() < 2 {
        return Err(Error::granularity(format!(
            "Granularity is undefined for a single time instant ({}); supply one explicitly",
            instants[0]
        )));
    }
    Ok(instants)
}

/// Coarsest step dividing every gap between consecutive boundaries, and hence
/// every extent length and every distance from the earliest boundary.
///
/// Fails for an empty set, a set collapsing to a single instant, or mixed
/// temporal kinds.
pub fn compute_common_granularity(extents: &[TemporalExtent]) -> Result<Granularity> {
    let instants = boundaries(extents)?;

    let granularity = match &instants[0] {
        TimeInstant::Relative(first) => {
            let step = gap_gcd(instants.iter().map(TimeInstant::ordinal));
            Granularity::relative(step, first.unit)
        }
        TimeInstant::Absolute(_) => {
            let times: Vec<&AbsoluteTime> =
                instants.iter().filter_map(TimeInstant::as_absolute).collect();
            if times.iter().all(|time| time.is_month_aligned()) {
                Granularity::from_months(gap_gcd(times.iter().map(|t| t.month_index())))
            } else {
                Granularity::from_seconds(gap_gcd(times.iter().map(|t| t.timestamp())))
            }
        }
    };

    debug!(
        "Computed granularity {} from {} extents ({} distinct boundaries)",
        granularity,
        extents.len(),
        instants.len()
    );
    Ok(granularity)
}

fn gap_gcd(values: impl Iterator<Item = i64>) -> i64 {
    let values: Vec<i64> = values.collect();
    values
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold(0, gcd)
}

/// Fails unless every boundary lies on the grid `epoch + k * granularity`,
/// with the epoch at the earliest boundary
pub fn validate_granularity(extents: &[TemporalExtent], granularity: &Granularity) -> Result<()> {
    if granularity.value <= 0 {
        return Err(Error::granularity(format!(
            "Granularity must be positive, got {}",
            granularity
        )));
    }
    let instants = match boundaries(extents) {
        Ok(instants) => instants,
        // A single instant lies on any grid
        Err(Error::Granularity { .. }) if !extents.is_empty() => return Ok(()),
        Err(e) => return Err(e),
    };
    if granularity.temporal_type() != instants[0].temporal_type() {
        return Err(Error::type_mismatch(
            instants[0].kind_label(),
            format!("{} granularity", granularity.temporal_type()),
        ));
    }

    let epoch = instants[0];
    for instant in &instants[1..] {
        if !on_grid(&epoch, instant, granularity)? {
            return Err(Error::granularity(format!(
                "{} is not a multiple of {} from {}",
                instant, granularity, epoch
            )));
        }
    }
    Ok(())
}

fn on_grid(epoch: &TimeInstant, instant: &TimeInstant, granularity: &Granularity) -> Result<bool> {
    match (epoch, instant) {
        (TimeInstant::Relative(_), TimeInstant::Relative(_)) => {
            Ok((instant.ordinal() - epoch.ordinal()) % granularity.value == 0)
        }
        (TimeInstant::Absolute(epoch), TimeInstant::Absolute(instant)) => {
            if let Some(step_months) = granularity.months() {
                let months = instant.month_index() - epoch.month_index();
                if months % step_months != 0 {
                    return Ok(false);
                }
                Ok(epoch.add_months(months)?.timestamp() == instant.timestamp())
            } else {
                let seconds = granularity.seconds().unwrap_or(1);
                Ok((instant.timestamp() - epoch.timestamp()) % seconds == 0)
            }
        }
        _ => Err(Error::type_mismatch(epoch.kind_label(), instant.kind_label())),
    }
}

/// Combine per-dataset granularities into one common granularity.
///
/// Month/year granules combine by month GCD and fixed-length granules by
/// seconds GCD. When both appear, every month/year step inside `range` is
/// expanded on the calendar and must be an exact multiple of the finest
/// fixed-length granule, which is then returned.
pub fn combine_granularities(
    granules: &[Granularity],
    range: Option<&TemporalExtent>,
) -> Result<Granularity> {
    let first = granules
        .first()
        .ok_or_else(|| Error::granularity("No granularities to combine"))?;

    if let GranularityUnit::Relative(unit) = first.unit {
        return combine_relative(granules, unit);
    }

    let mut month_step = 0;
    let mut second_step = 0;
    let mut calendar_granules = Vec::new();
    for granule in granules {
        match (granule.months(), granule.seconds()) {
            (Some(months), _) => {
                month_step = gcd(month_step, months);
                calendar_granules.push(months);
            }
            (None, Some(seconds)) => second_step = gcd(second_step, seconds),
            (None, None) => {
                return Err(Error::type_mismatch(
                    "absolute granularity",
                    format!("relative granularity '{}'", granule),
                ));
            }
        }
    }

    if second_step == 0 {
        return Ok(Granularity::from_months(month_step));
    }
    if month_step == 0 {
        return Ok(Granularity::from_seconds(second_step));
    }

    let range = range.ok_or_else(|| {
        Error::granularity(
            "Mixing month/year and fixed-length granularities requires a date range to expand",
        )
    })?;
    let (Some(start), Some(end)) = (
        range.start().as_absolute(),
        range.end_or_start().as_absolute(),
    ) else {
        return Err(Error::type_mismatch(
            "absolute date range",
            range.start().kind_label(),
        ));
    };

    for months in calendar_granules {
        let mut cursor = *start;
        while cursor.timestamp() < end.timestamp() {
            let next = cursor.add_months(months)?;
            let length = next.timestamp() - cursor.timestamp();
            if length % second_step != 0 {
                return Err(Error::granularity(format!(
                    "Calendar step {} from {} ({} s) is not a multiple of {}",
                    Granularity::from_months(months),
                    cursor,
                    length,
                    Granularity::from_seconds(second_step)
                )));
            }
            cursor = next;
        }
    }

    Ok(Granularity::from_seconds(second_step))
}

fn combine_relative(granules: &[Granularity], unit: RelativeUnit) -> Result<Granularity> {
    let mut step = 0;
    for granule in granules {
        match granule.unit {
            GranularityUnit::Relative(other) if other == unit => step = gcd(step, granule.value),
            _ => {
                return Err(Error::type_mismatch(
                    format!("relative granularity ({})", unit),
                    granule.to_string(),
                ));
            }
        }
    }
    Ok(Granularity::relative(step, unit))
}
