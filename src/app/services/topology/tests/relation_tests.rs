//! Tests for pairwise relation classification

use super::*;
use crate::Error;
use crate::app::services::topology::{Relation, relate};

#[test]
fn test_identical_points_are_equal() {
    assert_eq!(relate(&point(3), &point(3)).unwrap(), Relation::Equal);
}

#[test]
fn test_touching_intervals_meet() {
    assert_eq!(relate(&interval(1, 3), &interval(3, 5)).unwrap(), Relation::Meets);
    assert_eq!(relate(&interval(3, 5), &interval(1, 3)).unwrap(), Relation::MetBy);
}

#[test]
fn test_interval_relations() {
    let cases = [
        ((1, 2), (3, 5), Relation::Precedes),
        ((6, 8), (3, 5), Relation::Follows),
        ((1, 4), (3, 6), Relation::Overlaps),
        ((3, 6), (1, 4), Relation::OverlappedBy),
        ((2, 3), (1, 4), Relation::During),
        ((1, 4), (2, 3), Relation::Contains),
        ((1, 2), (1, 4), Relation::Starts),
        ((1, 4), (1, 2), Relation::StartedBy),
        ((3, 4), (1, 4), Relation::Finishes),
        ((1, 4), (3, 4), Relation::FinishedBy),
        ((1, 4), (1, 4), Relation::Equal),
    ];
    for ((a0, a1), (b0, b1), expected) in cases {
        assert_eq!(
            relate(&interval(a0, a1), &interval(b0, b1)).unwrap(),
            expected,
            "[{}, {}] vs [{}, {}]",
            a0,
            a1,
            b0,
            b1
        );
    }
}

#[test]
fn test_point_in_interval_relations() {
    let target = interval(2, 5);
    assert_eq!(relate(&point(1), &target).unwrap(), Relation::Precedes);
    assert_eq!(relate(&point(2), &target).unwrap(), Relation::Starts);
    assert_eq!(relate(&point(3), &target).unwrap(), Relation::During);
    assert_eq!(relate(&point(5), &target).unwrap(), Relation::Finishes);
    assert_eq!(relate(&point(6), &target).unwrap(), Relation::Follows);

    assert_eq!(relate(&target, &point(2)).unwrap(), Relation::StartedBy);
    assert_eq!(relate(&target, &point(3)).unwrap(), Relation::Contains);
    assert_eq!(relate(&target, &point(5)).unwrap(), Relation::FinishedBy);
}

#[test]
fn test_distinct_points_are_disjoint() {
    assert_eq!(relate(&point(1), &point(2)).unwrap(), Relation::Precedes);
    assert_eq!(relate(&point(2), &point(1)).unwrap(), Relation::Follows);
}

#[test]
fn test_relation_is_total_and_inverse_symmetric() {
    let extents = all_extents(5);
    for a in &extents {
        for b in &extents {
            let forward = relate(a, b).unwrap();
            let backward = relate(b, a).unwrap();
            assert!(Relation::ALL.contains(&forward));
            assert_eq!(forward.inverse(), backward, "{} vs {}", a, b);
        }
    }
}

#[test]
fn test_absolute_relations() {
    let january = absolute_interval("2001-01-01", "2001-02-01");
    let february = absolute_interval("2001-02-01", "2001-03-01");
    let mid_january = absolute_interval("2001-01-10", "2001-01-20");
    assert_eq!(relate(&january, &february).unwrap(), Relation::Meets);
    assert_eq!(relate(&mid_january, &january).unwrap(), Relation::During);
}

#[test]
fn test_mixed_kinds_fail() {
    let absolute = absolute_interval("2001-01-01", "2001-02-01");
    assert!(matches!(
        relate(&absolute, &interval(1, 2)),
        Err(Error::TemporalTypeMismatch { .. })
    ));
}

#[test]
fn test_relation_names_round_trip() {
    for relation in Relation::ALL {
        assert_eq!(relation.name().parse::<Relation>().unwrap(), relation);
    }
    assert!("sometimes".parse::<Relation>().is_err());
}
