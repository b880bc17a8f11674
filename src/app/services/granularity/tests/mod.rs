//! Tests for the granularity module


use crate::app::models::{AbsoluteTime, RelativeUnit, TemporalExtent, TimeInstant};

pub fn rel_point(at: i64) -> TemporalExtent {
    TemporalExtent::point(TimeInstant::relative(at, RelativeUnit::Days))
}

pub fn rel_interval(start: i64, end: i64) -> TemporalExtent {
    TemporalExtent::interval(
        TimeInstant::relative(start, RelativeUnit::Days),
        TimeInstant::relative(end, RelativeUnit::Days),
    )
    .unwrap()
}

pub fn abs(text: &str) -> TimeInstant {
    TimeInstant::Absolute(AbsoluteTime::parse(text).unwrap())
}

pub fn abs_interval(start: &str, end: &str) -> TemporalExtent {
    TemporalExtent::interval(abs(start), abs(end)).unwrap()
}

pub fn abs_point(at: &str) -> TemporalExtent {
    TemporalExtent::point(abs(at))
}
