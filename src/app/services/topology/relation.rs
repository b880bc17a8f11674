//! Pairwise temporal relations

use crate::app::models::TemporalExtent;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Relation of extent `a` to extent `b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Equal,
    During,
    Contains,
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    Finishes,
    FinishedBy,
    /// `a` ends strictly before `b` starts
    Precedes,
    /// `a` starts strictly after `b` ends
    Follows,
    /// `a` ends exactly where `b` starts
    Meets,
    /// `a` starts exactly where `b` ends
    MetBy,
}

impl Relation {
    pub const ALL: [Relation; 13] = [
        Relation::Equal,
        Relation::During,
        Relation::Contains,
        Relation::Overlaps,
        Relation::OverlappedBy,
        Relation::Starts,
        Relation::StartedBy,
        Relation::Finishes,
        Relation::FinishedBy,
        Relation::Precedes,
        Relation::Follows,
        Relation::Meets,
        Relation::MetBy,
    ];

    /// The relation of `b` to `a` when `self` is the relation of `a` to `b`
    pub fn inverse(&self) -> Relation {
        match self {
            Relation::Equal => Relation::Equal,
            Relation::During => Relation::Contains,
            Relation::Contains => Relation::During,
            Relation::Overlaps => Relation::OverlappedBy,
            Relation::OverlappedBy => Relation::Overlaps,
            Relation::Starts => Relation::StartedBy,
            Relation::StartedBy => Relation::Starts,
            Relation::Finishes => Relation::FinishedBy,
            Relation::FinishedBy => Relation::Finishes,
            Relation::Precedes => Relation::Follows,
            Relation::Follows => Relation::Precedes,
            Relation::Meets => Relation::MetBy,
            Relation::MetBy => Relation::Meets,
        }
    }

    /// Strictly separated in time, neither touching nor overlapping
    pub fn is_disjoint(&self) -> bool {
        matches!(self, Relation::Precedes | Relation::Follows)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Relation::Equal => "equal",
            Relation::During => "during",
            Relation::Contains => "contains",
            Relation::Overlaps => "overlaps",
            Relation::OverlappedBy => "overlapped_by",
            Relation::Starts => "starts",
            Relation::StartedBy => "started_by",
            Relation::Finishes => "finishes",
            Relation::FinishedBy => "finished_by",
            Relation::Precedes => "precedes",
            Relation::Follows => "follows",
            Relation::Meets => "meets",
            Relation::MetBy => "met_by",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Relation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Relation::ALL
            .iter()
            .copied()
            .find(|relation| relation.name() == wanted)
            .ok_or_else(|| Error::invalid_value(format!("Unknown temporal relation '{}'", s)))
    }
}

/// Classify the relation of `a` to `b`.
///
/// Fails if one extent is absolute and the other relative, or if relative
/// units differ.
pub fn relate(a: &TemporalExtent, b: &TemporalExtent) -> Result<Relation> {
    a.check_compatible(b)?;
    Ok(relate_ordinals(
        (a.start_ordinal(), a.end_ordinal(), a.is_point()),
        (b.start_ordinal(), b.end_ordinal(), b.is_point()),
    ))
}

/// Relation between two already validated extents given as `(start, end, is_point)`
pub(crate) fn relate_ordinals(a: (i64, i64, bool), b: (i64, i64, bool)) -> Relation {
    let (a_start, a_end, a_point) = a;
    let (b_start, b_end, b_point) = b;
    match (a_point, b_point) {
        (true, true) => match a_start.cmp(&b_start) {
            Ordering::Equal => Relation::Equal,
            Ordering::Less => Relation::Precedes,
            Ordering::Greater => Relation::Follows,
        },
        (true, false) => point_to_interval(a_start, b_start, b_end),
        (false, true) => point_to_interval(b_start, a_start, a_end).inverse(),
        (false, false) => interval_to_interval(a_start, a_end, b_start, b_end),
    }
}

fn point_to_interval(point: i64, start: i64, end: i64) -> Relation {
    if point < start {
        Relation::Precedes
    } else if point == start {
        Relation::Starts
    } else if point < end {
        Relation::During
    } else if point == end {
        Relation::Finishes
    } else {
        Relation::Follows
    }
}

fn interval_to_interval(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> Relation {
    if a_end < b_start {
        return Relation::Precedes;
    }
    if a_end == b_start {
        return Relation::Meets;
    }
    if b_end < a_start {
        return Relation::Follows;
    }
    if b_end == a_start {
        return Relation::MetBy;
    }

    match (a_start.cmp(&b_start), a_end.cmp(&b_end)) {
        (Ordering::Equal, Ordering::Equal) => Relation::Equal,
        (Ordering::Equal, Ordering::Less) => Relation::Starts,
        (Ordering::Equal, Ordering::Greater) => Relation::StartedBy,
        (Ordering::Greater, Ordering::Equal) => Relation::Finishes,
        (Ordering::Less, Ordering::Equal) => Relation::FinishedBy,
        (Ordering::Greater, Ordering::Less) => Relation::During,
        (Ordering::Less, Ordering::Greater) => Relation::Contains,
        (Ordering::Less, Ordering::Less) => Relation::Overlaps,
        (Ordering::Greater, Ordering::Greater) => Relation::OverlappedBy,
    }
}
