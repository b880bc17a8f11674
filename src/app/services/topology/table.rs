//! Relation tables between two collections of temporal objects

use super::relation::{Relation, relate_ordinals};
use crate::Result;
use crate::app::models::Temporal;
use tracing::debug;

/// Relation of `a` to `b`
#[derive(Debug, Clone)]
pub struct TemporalRelation<'a, A, B> {
    pub a: &'a A,
    pub b: &'a B,
    pub relation: Relation,
}

fn ordinals<T: Temporal>(item: &T) -> (i64, i64, bool) {
    let extent = item.temporal_extent();
    (extent.start_ordinal(), extent.end_ordinal(), extent.is_point())
}

/// Fails if any extent in either collection differs in kind from the first one
fn check_kinds<A: Temporal, B: Temporal>(maps_a: &[A], maps_b: &[B]) -> Result<()> {
    let reference = maps_a
        .first()
        .map(Temporal::temporal_extent)
        .or_else(|| maps_b.first().map(Temporal::temporal_extent));
    let Some(reference) = reference else {
        return Ok(());
    };
    for extent in maps_a
        .iter()
        .map(Temporal::temporal_extent)
        .chain(maps_b.iter().map(Temporal::temporal_extent))
    {
        reference.check_compatible(extent)?;
    }
    Ok(())
}

/// Every pair, including strictly separated ones, in input order
pub fn relate_all<'a, A: Temporal, B: Temporal>(
    maps_a: &'a [A],
    maps_b: &'a [B],
) -> Result<Vec<TemporalRelation<'a, A, B>>> {
    check_kinds(maps_a, maps_b)?;
    let mut table = Vec::with_capacity(maps_a.len() * maps_b.len());
    for a in maps_a {
        for b in maps_b {
            table.push(TemporalRelation {
                a,
                b,
                relation: relate_ordinals(ordinals(a), ordinals(b)),
            });
        }
    }
    Ok(table)
}

/// Every temporally related pair (any relation except `precedes`/`follows`)
/// by comparing all n·m pairs. Ordered by position in `maps_a`, then `maps_b`.
pub fn build_relation_table_naive<'a, A: Temporal, B: Temporal>(
    maps_a: &'a [A],
    maps_b: &'a [B],
) -> Result<Vec<TemporalRelation<'a, A, B>>> {
    Ok(relate_all(maps_a, maps_b)?
        .into_iter()
        .filter(|entry| !entry.relation.is_disjoint())
        .collect())
}

/// Same result as [`build_relation_table_naive`], computed with a sweep line.
///
/// Both collections are visited in start order. The window holds the `maps_b`
/// entries that have started by the end of the current `maps_a` entry and have
/// not ended before its start; entries leaving the window can never relate to
/// a later `maps_a` entry.
pub fn build_relation_table<'a, A: Temporal, B: Temporal>(
    maps_a: &'a [A],
    maps_b: &'a [B],
) -> Result<Vec<TemporalRelation<'a, A, B>>> {
    check_kinds(maps_a, maps_b)?;

    let a_bounds: Vec<_> = maps_a.iter().map(ordinals).collect();
    let b_bounds: Vec<_> = maps_b.iter().map(ordinals).collect();

    let mut order_a: Vec<usize> = (0..maps_a.len()).collect();
    order_a.sort_by_key(|&i| a_bounds[i].0);
    let mut order_b: Vec<usize> = (0..maps_b.len()).collect();
    order_b.sort_by_key(|&i| b_bounds[i].0);

    let mut found: Vec<(usize, usize, Relation)> = Vec::new();
    let mut window: Vec<usize> = Vec::new();
    let mut next_b = 0;
    let mut comparisons = 0usize;

    for &ia in &order_a {
        let (a_start, a_end, _) = a_bounds[ia];

        while next_b < order_b.len() && b_bounds[order_b[next_b]].0 <= a_end {
            window.push(order_b[next_b]);
            next_b += 1;
        }
        window.retain(|&ib| b_bounds[ib].1 >= a_start);

        for &ib in &window {
            comparisons += 1;
            let relation = relate_ordinals(a_bounds[ia], b_bounds[ib]);
            if !relation.is_disjoint() {
                found.push((ia, ib, relation));
            }
        }
    }

    debug!(
        "Sweep-line relation table: {} x {} maps, {} comparisons, {} relations",
        maps_a.len(),
        maps_b.len(),
        comparisons,
        found.len()
    );

    found.sort_by_key(|&(ia, ib, _)| (ia, ib));
    Ok(found
        .into_iter()
        .map(|(ia, ib, relation)| TemporalRelation {
            a: &maps_a[ia],
            b: &maps_b[ib],
            relation,
        })
        .collect())
}
