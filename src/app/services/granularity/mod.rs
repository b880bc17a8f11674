//! Temporal granularity of map series
//!
//! The granularity of a series is the coarsest step such that every start
//! and end time lies on a common grid anchored at the earliest time stamp.
//! It drives the slot grid built by the sampling service.
//!
//! Month and year steps have no fixed length. A series whose time stamps all
//! fall on the first of a month keeps a symbolic month/year granularity;
//! anything else is reduced to seconds and reported in the largest fixed unit
//! that divides the result.

pub mod calculator;

#[cfg(test)]
pub mod tests;

pub use calculator::{combine_granularities, compute_common_granularity, validate_granularity};

use crate::app::models::{CalendarUnit, Increment, RelativeUnit, TemporalType};
use crate::constants::{MONTHS_PER_YEAR, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use crate::{Error, Result};
use std::fmt;

/// Unit of a granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GranularityUnit {
    Calendar(CalendarUnit),
    Relative(RelativeUnit),
}

/// A positive step along the time line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity {
    pub value: i64,
    pub unit: GranularityUnit,
}

impl Granularity {
    pub fn calendar(value: i64, unit: CalendarUnit) -> Self {
        Self {
            value,
            unit: GranularityUnit::Calendar(unit),
        }
    }

    pub fn relative(value: i64, unit: RelativeUnit) -> Self {
        Self {
            value,
            unit: GranularityUnit::Relative(unit),
        }
    }

    /// Express a month count as years when it divides evenly
    pub fn from_months(months: i64) -> Self {
        if months % MONTHS_PER_YEAR == 0 {
            Self::calendar(months / MONTHS_PER_YEAR, CalendarUnit::Years)
        } else {
            Self::calendar(months, CalendarUnit::Months)
        }
    }

    /// Express a second count in the largest fixed unit that divides it
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds % SECONDS_PER_DAY == 0 {
            Self::calendar(seconds / SECONDS_PER_DAY, CalendarUnit::Days)
        } else if seconds % SECONDS_PER_HOUR == 0 {
            Self::calendar(seconds / SECONDS_PER_HOUR, CalendarUnit::Hours)
        } else if seconds % SECONDS_PER_MINUTE == 0 {
            Self::calendar(seconds / SECONDS_PER_MINUTE, CalendarUnit::Minutes)
        } else {
            Self::calendar(seconds, CalendarUnit::Seconds)
        }
    }

    /// Parse `"1 month"` for absolute time or `"3"` for relative time
    pub fn parse(
        text: &str,
        temporal_type: TemporalType,
        unit: Option<RelativeUnit>,
    ) -> Result<Self> {
        let increment: Increment = text.parse()?;
        let granularity = match (temporal_type, increment) {
            (TemporalType::Absolute, Increment::Calendar { count, unit }) => {
                Granularity::calendar(count, unit)
            }
            (TemporalType::Relative, Increment::Relative(value)) => {
                Granularity::relative(value, unit.unwrap_or(RelativeUnit::Untyped))
            }
            (TemporalType::Absolute, _) => {
                return Err(Error::granularity(format!(
                    "Absolute granularity needs a unit, e.g. '1 day', got '{}'",
                    text
                )));
            }
            (TemporalType::Relative, _) => {
                return Err(Error::granularity(format!(
                    "Relative granularity must be a plain number, got '{}'",
                    text
                )));
            }
        };
        if granularity.value <= 0 {
            return Err(Error::granularity(format!(
                "Granularity must be positive, got '{}'",
                text
            )));
        }
        Ok(granularity)
    }

    pub fn temporal_type(&self) -> TemporalType {
        match self.unit {
            GranularityUnit::Calendar(_) => TemporalType::Absolute,
            GranularityUnit::Relative(_) => TemporalType::Relative,
        }
    }

    /// The step as an increment for time arithmetic
    pub fn to_increment(&self) -> Increment {
        match self.unit {
            GranularityUnit::Calendar(unit) => Increment::calendar(self.value, unit),
            GranularityUnit::Relative(_) => Increment::Relative(self.value),
        }
    }

    /// Length in months for month and year granules
    pub fn months(&self) -> Option<i64> {
        match self.unit {
            GranularityUnit::Calendar(unit) => unit.months().map(|m| m * self.value),
            GranularityUnit::Relative(_) => None,
        }
    }

    /// Length in seconds for fixed-length absolute granules
    pub fn seconds(&self) -> Option<i64> {
        match self.unit {
            GranularityUnit::Calendar(unit) => unit.fixed_seconds().map(|s| s * self.value),
            GranularityUnit::Relative(_) => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_increment())
    }
}

/// Greatest common divisor of two non-negative numbers
pub(crate) fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
