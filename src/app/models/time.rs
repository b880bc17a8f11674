//! Time stamps, temporal extents and calendar increments.
//!
//! Absolute time is calendar based (optionally carrying a fixed UTC offset),
//! relative time is an integer tagged with a unit. Values of the two kinds,
//! or relative values of different units, never compare with each other.

use crate::constants::{DATETIME_DISPLAY_FORMAT, MONTHS_PER_YEAR, SECONDS_PER_DAY};
use crate::constants::{SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_WEEK};
use crate::{Error, Result};
use chrono::{Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Whether a dataset is stamped with calendar time or with plain numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalType {
    Absolute,
    Relative,
}

impl TemporalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalType::Absolute => "absolute",
            TemporalType::Relative => "relative",
        }
    }
}

impl fmt::Display for TemporalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "absolute" => Ok(TemporalType::Absolute),
            "relative" => Ok(TemporalType::Relative),
            other => Err(Error::invalid_value(format!(
                "Unknown temporal type '{}' (expected absolute or relative)",
                other
            ))),
        }
    }
}

/// Unit attached to relative time values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeUnit {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
    /// Purely relative series without a physical unit
    #[serde(rename = "none")]
    Untyped,
}

impl RelativeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeUnit::Years => "years",
            RelativeUnit::Months => "months",
            RelativeUnit::Days => "days",
            RelativeUnit::Hours => "hours",
            RelativeUnit::Minutes => "minutes",
            RelativeUnit::Seconds => "seconds",
            RelativeUnit::Untyped => "none",
        }
    }
}

impl fmt::Display for RelativeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelativeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "year" | "years" => Ok(RelativeUnit::Years),
            "month" | "months" => Ok(RelativeUnit::Months),
            "day" | "days" => Ok(RelativeUnit::Days),
            "hour" | "hours" => Ok(RelativeUnit::Hours),
            "minute" | "minutes" => Ok(RelativeUnit::Minutes),
            "second" | "seconds" => Ok(RelativeUnit::Seconds),
            "" | "none" => Ok(RelativeUnit::Untyped),
            other => Err(Error::invalid_value(format!(
                "Unknown relative time unit '{}'",
                other
            ))),
        }
    }
}

/// A calendar time stamp with an optional fixed offset from UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbsoluteTime {
    datetime: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl AbsoluteTime {
    pub fn new(datetime: NaiveDateTime, offset: Option<FixedOffset>) -> Self {
        Self { datetime, offset }
    }

    /// Midnight of the given calendar day, without offset
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            Error::invalid_value(format!("Invalid date {:04}-{:02}-{:02}", year, month, day))
        })?;
        Ok(Self::new(date.and_time(NaiveTime::MIN), None))
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS[.f]]` (space or `T`), with an
    /// optional `Z` or `+HH:MM` suffix on the time part
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        let (date_part, time_part) = match text.find([' ', 'T']) {
            Some(idx) => (&text[..idx], Some(text[idx + 1..].trim())),
            None => (text, None),
        };

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|e| Error::datetime_parsing(format!("Invalid date '{}'", input), e))?;

        let Some(time_text) = time_part else {
            return Ok(Self::new(date.and_time(NaiveTime::MIN), None));
        };

        let (clock, offset) = split_offset(time_text)?;
        let mut last_error = None;
        for format in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
            match NaiveTime::parse_from_str(clock, format) {
                Ok(time) => return Ok(Self::new(date.and_time(time), offset)),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(Error::datetime_parsing(
                format!("Invalid time of day in '{}'", input),
                e,
            )),
            None => Err(Error::invalid_value(format!("Invalid time stamp '{}'", input))),
        }
    }

    /// Local wall-clock time as written
    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Wall-clock time normalized to UTC; stamps without offset are taken as UTC
    pub fn utc(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => {
                self.datetime - TimeDelta::seconds(i64::from(offset.local_minus_utc()))
            }
            None => self.datetime,
        }
    }

    /// Seconds since the Unix epoch in UTC
    pub fn timestamp(&self) -> i64 {
        self.utc().and_utc().timestamp()
    }

    pub fn add_months(&self, months: i64) -> Result<Self> {
        let magnitude = u32::try_from(months.unsigned_abs())
            .map_err(|_| Error::invalid_value(format!("Month increment {} out of range", months)))?;
        let shifted = if months >= 0 {
            self.datetime.checked_add_months(Months::new(magnitude))
        } else {
            self.datetime.checked_sub_months(Months::new(magnitude))
        };
        shifted
            .map(|datetime| Self::new(datetime, self.offset))
            .ok_or_else(|| Error::invalid_value(format!("{} + {} months overflows", self, months)))
    }

    pub fn add_seconds(&self, seconds: i64) -> Result<Self> {
        TimeDelta::try_seconds(seconds)
            .and_then(|delta| self.datetime.checked_add_signed(delta))
            .map(|datetime| Self::new(datetime, self.offset))
            .ok_or_else(|| {
                Error::invalid_value(format!("{} + {} seconds overflows", self, seconds))
            })
    }

    /// Months elapsed since year 0, for month-aligned stamps
    pub fn month_index(&self) -> i64 {
        let utc = self.utc();
        i64::from(utc.year()) * MONTHS_PER_YEAR + i64::from(utc.month0())
    }

    /// True at midnight on the first day of a month
    pub fn is_month_aligned(&self) -> bool {
        let utc = self.utc();
        utc.day() == 1 && utc.time() == NaiveTime::MIN
    }
}

fn split_offset(time_text: &str) -> Result<(&str, Option<FixedOffset>)> {
    if let Some(clock) = time_text.strip_suffix('Z') {
        return Ok((clock.trim(), FixedOffset::east_opt(0)));
    }
    let Some(idx) = time_text.rfind(['+', '-']) else {
        return Ok((time_text, None));
    };
    let (clock, suffix) = time_text.split_at(idx);
    let sign = if suffix.starts_with('-') { -1 } else { 1 };
    let digits: String = suffix[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::invalid_value(format!(
            "Invalid UTC offset '{}'",
            suffix
        )));
    }
    let hours: i32 = digits[..2].parse().unwrap_or(0);
    let minutes: i32 = digits[2..].parse().unwrap_or(0);
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| Error::invalid_value(format!("UTC offset '{}' out of range", suffix)))?;
    Ok((clock.trim(), Some(offset)))
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format(DATETIME_DISPLAY_FORMAT))?;
        if let Some(offset) = self.offset {
            write!(f, "{}", offset)?;
        }
        Ok(())
    }
}

/// A numeric time value tagged with its unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeTime {
    pub value: i64,
    pub unit: RelativeUnit,
}

impl RelativeTime {
    pub fn new(value: i64, unit: RelativeUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A point in time, either absolute or relative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeInstant {
    Absolute(AbsoluteTime),
    Relative(RelativeTime),
}

impl TimeInstant {
    /// Parse a textual time stamp of the given kind
    pub fn parse(text: &str, temporal_type: TemporalType, unit: RelativeUnit) -> Result<Self> {
        match temporal_type {
            TemporalType::Absolute => Ok(TimeInstant::Absolute(AbsoluteTime::parse(text)?)),
            TemporalType::Relative => {
                let value = text.trim().parse::<i64>().map_err(|_| {
                    Error::invalid_value(format!("Invalid relative time value '{}'", text))
                })?;
                Ok(TimeInstant::Relative(RelativeTime::new(value, unit)))
            }
        }
    }

    pub fn absolute(time: AbsoluteTime) -> Self {
        TimeInstant::Absolute(time)
    }

    pub fn relative(value: i64, unit: RelativeUnit) -> Self {
        TimeInstant::Relative(RelativeTime::new(value, unit))
    }

    pub fn temporal_type(&self) -> TemporalType {
        match self {
            TimeInstant::Absolute(_) => TemporalType::Absolute,
            TimeInstant::Relative(_) => TemporalType::Relative,
        }
    }

    /// Relative unit, or `None` for absolute time
    pub fn relative_unit(&self) -> Option<RelativeUnit> {
        match self {
            TimeInstant::Absolute(_) => None,
            TimeInstant::Relative(time) => Some(time.unit),
        }
    }

    /// Human description of the kind, used in mismatch errors
    pub fn kind_label(&self) -> String {
        match self {
            TimeInstant::Absolute(_) => "absolute time".to_string(),
            TimeInstant::Relative(time) => format!("relative time ({})", time.unit),
        }
    }

    /// Fails unless both instants are absolute, or relative with the same unit
    pub fn check_compatible(&self, other: &TimeInstant) -> Result<()> {
        match (self, other) {
            (TimeInstant::Absolute(_), TimeInstant::Absolute(_)) => Ok(()),
            (TimeInstant::Relative(a), TimeInstant::Relative(b)) if a.unit == b.unit => Ok(()),
            _ => Err(Error::type_mismatch(self.kind_label(), other.kind_label())),
        }
    }

    /// Position on the time line: UTC seconds for absolute, raw value for relative.
    /// Only meaningful between compatible instants.
    pub fn ordinal(&self) -> i64 {
        match self {
            TimeInstant::Absolute(time) => time.timestamp(),
            TimeInstant::Relative(time) => time.value,
        }
    }

    pub fn try_cmp(&self, other: &TimeInstant) -> Result<Ordering> {
        self.check_compatible(other)?;
        Ok(self.ordinal().cmp(&other.ordinal()))
    }

    /// Apply an increment; calendar increments need absolute time, numeric ones relative time
    pub fn incremented_by(&self, by: &Increment) -> Result<TimeInstant> {
        match (self, by) {
            (TimeInstant::Absolute(time), Increment::Calendar { count, unit }) => {
                let overflow = || Error::invalid_value(format!("Increment '{}' out of range", by));
                let shifted = match unit.fixed_seconds() {
                    Some(seconds) => {
                        time.add_seconds(count.checked_mul(seconds).ok_or_else(overflow)?)?
                    }
                    None => {
                        let months = count.checked_mul(unit.months().unwrap_or(1));
                        time.add_months(months.ok_or_else(overflow)?)?
                    }
                };
                Ok(TimeInstant::Absolute(shifted))
            }
            (TimeInstant::Relative(time), Increment::Relative(step)) => {
                let value = time.value.checked_add(*step).ok_or_else(|| {
                    Error::invalid_value(format!("{} + {} overflows", time.value, step))
                })?;
                Ok(TimeInstant::Relative(RelativeTime::new(value, time.unit)))
            }
            (TimeInstant::Absolute(_), Increment::Relative(_)) => Err(Error::type_mismatch(
                "calendar increment such as '1 day'",
                format!("numeric increment '{}'", by),
            )),
            (TimeInstant::Relative(_), Increment::Calendar { .. }) => Err(Error::type_mismatch(
                "numeric increment",
                format!("calendar increment '{}'", by),
            )),
        }
    }

    pub fn as_absolute(&self) -> Option<&AbsoluteTime> {
        match self {
            TimeInstant::Absolute(time) => Some(time),
            TimeInstant::Relative(_) => None,
        }
    }
}

impl fmt::Display for TimeInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInstant::Absolute(time) => write!(f, "{}", time),
            TimeInstant::Relative(time) => write!(f, "{}", time),
        }
    }
}

/// Increment an instant by a textual amount (`"3 months"`, or `"5"` for relative time)
pub fn increment(instant: &TimeInstant, by: &str) -> Result<TimeInstant> {
    instant.incremented_by(&by.parse()?)
}

/// Calendar units accepted by absolute increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarUnit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl CalendarUnit {
    /// Length in seconds, `None` for months and years
    pub fn fixed_seconds(&self) -> Option<i64> {
        match self {
            CalendarUnit::Years | CalendarUnit::Months => None,
            CalendarUnit::Weeks => Some(SECONDS_PER_WEEK),
            CalendarUnit::Days => Some(SECONDS_PER_DAY),
            CalendarUnit::Hours => Some(SECONDS_PER_HOUR),
            CalendarUnit::Minutes => Some(SECONDS_PER_MINUTE),
            CalendarUnit::Seconds => Some(1),
        }
    }

    /// Length in months, `None` for fixed-length units
    pub fn months(&self) -> Option<i64> {
        match self {
            CalendarUnit::Years => Some(MONTHS_PER_YEAR),
            CalendarUnit::Months => Some(1),
            _ => None,
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            CalendarUnit::Years => "year",
            CalendarUnit::Months => "month",
            CalendarUnit::Weeks => "week",
            CalendarUnit::Days => "day",
            CalendarUnit::Hours => "hour",
            CalendarUnit::Minutes => "minute",
            CalendarUnit::Seconds => "second",
        }
    }
}

impl FromStr for CalendarUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "year" | "years" => Ok(CalendarUnit::Years),
            "month" | "months" => Ok(CalendarUnit::Months),
            "week" | "weeks" => Ok(CalendarUnit::Weeks),
            "day" | "days" => Ok(CalendarUnit::Days),
            "hour" | "hours" => Ok(CalendarUnit::Hours),
            "minute" | "minutes" => Ok(CalendarUnit::Minutes),
            "second" | "seconds" => Ok(CalendarUnit::Seconds),
            other => Err(Error::invalid_value(format!("Unknown calendar unit '{}'", other))),
        }
    }
}

/// A signed step along the time line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Increment {
    /// `"<count> <unit>"` for absolute time
    Calendar { count: i64, unit: CalendarUnit },
    /// Plain number for relative time
    Relative(i64),
}

impl Increment {
    pub fn calendar(count: i64, unit: CalendarUnit) -> Self {
        Increment::Calendar { count, unit }
    }

    /// The increment repeated `factor` times
    pub fn scaled(&self, factor: i64) -> Result<Self> {
        let overflow = || {
            Error::invalid_value(format!("Increment '{}' times {} out of range", self, factor))
        };
        match *self {
            Increment::Calendar { count, unit } => Ok(Increment::Calendar {
                count: count.checked_mul(factor).ok_or_else(overflow)?,
                unit,
            }),
            Increment::Relative(step) => {
                Ok(Increment::Relative(step.checked_mul(factor).ok_or_else(overflow)?))
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Increment::Calendar { count, .. } => *count == 0,
            Increment::Relative(step) => *step == 0,
        }
    }
}

fn increment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([+-]?\d+)\s*([A-Za-z]+)?\s*$").expect("increment pattern is valid")
    })
}

impl FromStr for Increment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let captures = increment_pattern()
            .captures(s)
            .ok_or_else(|| Error::invalid_value(format!("Invalid increment '{}'", s)))?;
        let count: i64 = captures[1]
            .parse()
            .map_err(|_| Error::invalid_value(format!("Invalid increment count in '{}'", s)))?;
        match captures.get(2) {
            Some(unit) => Ok(Increment::Calendar {
                count,
                unit: unit.as_str().parse()?,
            }),
            None => Ok(Increment::Relative(count)),
        }
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Increment::Calendar { count, unit } if count.unsigned_abs() == 1 => {
                write!(f, "{} {}", count, unit.singular())
            }
            Increment::Calendar { count, unit } => write!(f, "{} {}s", count, unit.singular()),
            Increment::Relative(step) => write!(f, "{}", step),
        }
    }
}

/// Valid time of a map or dataset: a point when `end` is absent, else an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemporalExtent {
    start: TimeInstant,
    end: Option<TimeInstant>,
}

impl TemporalExtent {
    /// Fails if the instants are of different kinds or `end` is not after `start`
    pub fn new(start: TimeInstant, end: Option<TimeInstant>) -> Result<Self> {
        if let Some(end) = &end {
            if start.try_cmp(end)? != Ordering::Less {
                return Err(Error::invalid_extent(format!(
                    "end time {} must be after start time {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn point(start: TimeInstant) -> Self {
        Self { start, end: None }
    }

    pub fn interval(start: TimeInstant, end: TimeInstant) -> Result<Self> {
        Self::new(start, Some(end))
    }

    pub fn start(&self) -> &TimeInstant {
        &self.start
    }

    pub fn end(&self) -> Option<&TimeInstant> {
        self.end.as_ref()
    }

    /// End of an interval, start of a point
    pub fn end_or_start(&self) -> &TimeInstant {
        self.end.as_ref().unwrap_or(&self.start)
    }

    pub fn is_point(&self) -> bool {
        self.end.is_none()
    }

    pub fn temporal_type(&self) -> TemporalType {
        self.start.temporal_type()
    }

    pub fn relative_unit(&self) -> Option<RelativeUnit> {
        self.start.relative_unit()
    }

    pub fn start_ordinal(&self) -> i64 {
        self.start.ordinal()
    }

    pub fn end_ordinal(&self) -> i64 {
        self.end_or_start().ordinal()
    }

    pub fn check_compatible(&self, other: &TemporalExtent) -> Result<()> {
        self.start.check_compatible(&other.start)
    }

    /// Order by start, then by end; points sort before intervals sharing their start
    pub fn compare(&self, other: &TemporalExtent) -> Result<Ordering> {
        self.check_compatible(other)?;
        Ok(self
            .start_ordinal()
            .cmp(&other.start_ordinal())
            .then(self.end_ordinal().cmp(&other.end_ordinal()))
            .then(self.is_point().cmp(&other.is_point()).reverse()))
    }

    /// Length in seconds for absolute time, in raw units for relative time
    pub fn duration(&self) -> f64 {
        (self.end_ordinal() - self.start_ordinal()) as f64
    }

    /// Move both endpoints by the same increment
    pub fn shift(&self, by: &Increment) -> Result<TemporalExtent> {
        let start = self.start.incremented_by(by)?;
        let end = self
            .end
            .as_ref()
            .map(|end| end.incremented_by(by))
            .transpose()?;
        TemporalExtent::new(start, end).map_err(|e| match e {
            Error::InvalidExtent { message } => Error::invalid_extent(format!(
                "shifting {} by {} would invert the extent: {}",
                self, by, message
            )),
            other => other,
        })
    }

    /// Smallest extent covering both
    pub fn union(&self, other: &TemporalExtent) -> Result<TemporalExtent> {
        self.check_compatible(other)?;
        let start = if other.start_ordinal() < self.start_ordinal() {
            other.start
        } else {
            self.start
        };
        let end = if other.end_ordinal() > self.end_ordinal() {
            *other.end_or_start()
        } else {
            *self.end_or_start()
        };
        if start.ordinal() == end.ordinal() {
            Ok(TemporalExtent::point(start))
        } else {
            TemporalExtent::interval(start, end)
        }
    }
}

impl fmt::Display for TemporalExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{} - {}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

/// Anything that carries a temporal extent
pub trait Temporal {
    fn temporal_extent(&self) -> &TemporalExtent;
}

impl Temporal for TemporalExtent {
    fn temporal_extent(&self) -> &TemporalExtent {
        self
    }
}
