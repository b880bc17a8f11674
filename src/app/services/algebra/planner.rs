//! Planning: resolve every dataset reference to concrete maps, slot by slot
//!
//! Planning reads one consistent snapshot of all referenced datasets, samples
//! them onto a common slot grid and produces one [`SlotPlan`] per slot that
//! will reach the backend. Every error raised here happens before any backend
//! call or metadata write.

use super::ast::{AlgebraStatement, DatasetRef, Expr, SpatialOffset};
use super::config::AlgebraOptions;
use crate::app::adapters::backend::BackendRequest;
use crate::app::models::{
    DatasetKind, DatasetSnapshot, MapEntry, MapType, SpaceTimeDataset, SpatialExtent,
    TemporalExtent, TemporalType, split_id,
};
use crate::app::services::granularity::{Granularity, compute_common_granularity};
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::app::services::sampling::{TemporalSlot, sample};
use crate::constants::NULL_LITERAL;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// A dataset reference resolved for one slot
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperand {
    /// Reference as written, e.g. `A[-1]`
    pub reference: String,
    pub dataset_id: String,
    /// `None` when the referenced slot holds no map
    pub map: Option<MapEntry>,
}

/// Work for one slot that reaches the backend
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPlan {
    pub index: usize,
    pub extent: TemporalExtent,
    /// Right-hand side with operands replaced by map ids or literals
    pub expression: String,
    pub operands: Vec<ResolvedOperand>,
    /// Map to register once the backend succeeds
    pub output: MapEntry,
}

impl SlotPlan {
    pub fn request(&self, overwrite: bool) -> BackendRequest {
        BackendRequest {
            slot: self.index,
            extent: self.extent.to_string(),
            map_type: self.output.map_type,
            expression: self.expression.clone(),
            output_name: self.output.name().to_string(),
            overwrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// An operand has no map and null registration is off
    MissingOperand { reference: String },
    /// None of the unshifted datasets has a map in the slot
    NoBaseData,
    /// Operand maps do not share any area
    SpatiallyDisjoint,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingOperand { reference } => write!(f, "no map for {}", reference),
            SkipReason::NoBaseData => f.write_str("no base data"),
            SkipReason::SpatiallyDisjoint => f.write_str("operand maps do not intersect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSlot {
    pub index: usize,
    pub extent: TemporalExtent,
    pub reason: SkipReason,
}

/// Result of planning an algebra statement
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    pub statement: AlgebraStatement,
    /// Dataset that receives the results
    pub output_dataset: SpaceTimeDataset,
    /// Referenced datasets, in order of first appearance
    pub inputs: Vec<String>,
    /// Granule of the slot grid; `None` when the inputs hold no maps
    pub granularity: Option<Granularity>,
    /// Slots to execute, in slot order
    pub slots: Vec<SlotPlan>,
    pub skipped: Vec<SkippedSlot>,
}

impl EvaluationPlan {
    pub fn map_type(&self) -> MapType {
        self.output_dataset.kind.map_type()
    }

    /// Backend requests in slot order
    pub fn requests(&self, overwrite: bool) -> Vec<BackendRequest> {
        self.slots.iter().map(|slot| slot.request(overwrite)).collect()
    }
}

/// Build the evaluation plan for `statement`
pub fn plan(
    statement: &AlgebraStatement,
    conn: &TemporalDatabaseConnection,
    options: &AlgebraOptions,
) -> Result<EvaluationPlan> {
    check_basename(&options.basename)?;

    let references = statement.expression.dataset_refs();
    if references.is_empty() {
        return Err(Error::invalid_value(format!(
            "Expression '{}' references no space time dataset",
            statement.expression
        )));
    }

    let mut inputs: Vec<String> = Vec::new();
    for reference in &references {
        let id = conn.qualify(&reference.name);
        if !inputs.contains(&id) {
            inputs.push(id);
        }
    }

    let snapshots = conn.snapshots(&inputs, None)?;
    let kind = check_kinds(&snapshots)?;
    let first = &snapshots[0].dataset;
    check_references(&statement.expression, kind, first.temporal_type)?;

    let output_dataset = output_dataset(statement, conn, first, kind, &inputs, options)?;

    let extents: Vec<TemporalExtent> = snapshots
        .iter()
        .flat_map(|snapshot| snapshot.maps.iter().map(|map| map.extent))
        .collect();
    let granularity = match &options.granularity {
        Some(text) => Some(Granularity::parse(text, first.temporal_type, first.relative_unit)?),
        None if extents.is_empty() => None,
        None => Some(compute_common_granularity(&extents)?),
    };

    let refs: Vec<&DatasetSnapshot> = snapshots.iter().collect();
    let slots = sample(&refs, &options.methods, granularity.as_ref(), true)?;

    let resolver = Resolver::new(&slots, conn);
    let base_datasets = base_datasets(&references, conn);

    let mut planned = Vec::new();
    let mut skipped = Vec::new();
    for slot in &slots {
        match resolver.plan_slot(slot, statement, kind, &base_datasets, options)? {
            Ok(slot_plan) => planned.push(slot_plan),
            Err(reason) => {
                debug!("Skipping slot {} ({}): {}", slot.index, slot.extent, reason);
                skipped.push(SkippedSlot {
                    index: slot.index,
                    extent: slot.extent,
                    reason,
                });
            }
        }
    }

    check_output_owners(conn, &output_dataset, &planned, options.overwrite)?;

    info!(
        "Planned <{}>: {} slots to compute, {} skipped",
        output_dataset.id,
        planned.len(),
        skipped.len()
    );
    Ok(EvaluationPlan {
        statement: statement.clone(),
        output_dataset,
        inputs,
        granularity,
        slots: planned,
        skipped,
    })
}

fn check_basename(basename: &str) -> Result<()> {
    let valid = !basename.is_empty()
        && basename
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && basename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_value(format!(
            "Invalid basename '{}': use letters, digits, '_' and '.'",
            basename
        )))
    }
}

fn check_kinds(snapshots: &[DatasetSnapshot]) -> Result<DatasetKind> {
    let first = snapshots
        .first()
        .ok_or_else(|| Error::invalid_value("Expression references no space time dataset"))?;
    let kind = first.dataset.kind;
    if let Some(other) = snapshots.iter().find(|s| s.dataset.kind != kind) {
        return Err(Error::invalid_value(format!(
            "Cannot combine {} <{}> with {} <{}>",
            kind,
            first.id(),
            other.dataset.kind,
            other.id()
        )));
    }
    Ok(kind)
}

/// Offsets must fit the map type and calendar functions need absolute time
fn check_references(
    expression: &Expr,
    kind: DatasetKind,
    temporal_type: TemporalType,
) -> Result<()> {
    for leaf in expression.leaves() {
        match leaf {
            Expr::Dataset(reference) => check_reference(reference, kind)?,
            Expr::Function { function, argument } => {
                check_reference(argument, kind)?;
                if function.needs_absolute_time() && temporal_type != TemporalType::Absolute {
                    return Err(Error::type_mismatch(
                        format!("absolute time for {}()", function),
                        format!("{} time", temporal_type),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_reference(reference: &DatasetRef, kind: DatasetKind) -> Result<()> {
    let Some(spatial) = reference.offset.spatial else {
        return Ok(());
    };
    match kind {
        DatasetKind::Stvds => Err(Error::invalid_value(format!(
            "Spatial offsets are not supported for vector datasets: {}",
            reference
        ))),
        DatasetKind::Strds if spatial.depth.is_some_and(|depth| depth != 0) => {
            Err(Error::invalid_value(format!(
                "Depth offsets need a 3D raster dataset: {}",
                reference
            )))
        }
        _ => Ok(()),
    }
}

fn output_dataset(
    statement: &AlgebraStatement,
    conn: &TemporalDatabaseConnection,
    template: &SpaceTimeDataset,
    kind: DatasetKind,
    inputs: &[String],
    options: &AlgebraOptions,
) -> Result<SpaceTimeDataset> {
    if let (_, Some(mapset)) = split_id(&statement.output) {
        if mapset != conn.mapset() {
            return Err(Error::invalid_value(format!(
                "Results can only be written to the current mapset <{}>, not <{}>",
                conn.mapset(),
                mapset
            )));
        }
    }
    let id = conn.qualify(&statement.output);
    if inputs.contains(&id) {
        return Err(Error::invalid_value(format!(
            "Output dataset <{}> is also an input",
            id
        )));
    }
    if let Some(existing) = conn.find_dataset(&id)? {
        if !options.overwrite {
            return Err(Error::invalid_value(format!(
                "{} <{}> already exists; use overwrite to replace it",
                existing.kind, existing.id
            )));
        }
    }

    let mut dataset = SpaceTimeDataset::new(id, kind, template.temporal_type)
        .with_title(statement.to_string())
        .with_description(format!("Result of the temporal algebra statement: {}", statement))
        .with_semantic_type(template.semantic_type);
    dataset.relative_unit = template.relative_unit;
    Ok(dataset)
}

/// Output map ids must not belong to another dataset
fn check_output_owners(
    conn: &TemporalDatabaseConnection,
    output: &SpaceTimeDataset,
    slots: &[SlotPlan],
    overwrite: bool,
) -> Result<()> {
    for slot in slots {
        if let Some(owner) = conn.owner_of(&slot.output.id)? {
            if owner != output.id || !overwrite {
                return Err(Error::invalid_value(format!(
                    "Output map <{}> is already registered in <{}>",
                    slot.output.id, owner
                )));
            }
        }
    }
    Ok(())
}

/// Datasets referenced without a temporal offset; all datasets if every
/// reference is shifted
fn base_datasets(references: &[&DatasetRef], conn: &TemporalDatabaseConnection) -> Vec<String> {
    let unshifted: Vec<String> = references
        .iter()
        .filter(|r| r.offset.time == 0)
        .map(|r| conn.qualify(&r.name))
        .collect();
    if unshifted.is_empty() {
        references.iter().map(|r| conn.qualify(&r.name)).collect()
    } else {
        unshifted
    }
}

struct Resolver<'a> {
    slots: &'a [TemporalSlot],
    /// Grid index to position in `slots`
    positions: HashMap<usize, usize>,
    conn: &'a TemporalDatabaseConnection,
}

impl<'a> Resolver<'a> {
    fn new(slots: &'a [TemporalSlot], conn: &'a TemporalDatabaseConnection) -> Self {
        let positions = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.index, position))
            .collect();
        Self {
            slots,
            positions,
            conn,
        }
    }

    /// First map of `dataset_id` in the slot `offset` steps away from `index`
    fn map_at(&self, dataset_id: &str, index: usize, offset: i64) -> Option<&'a MapEntry> {
        let target = usize::try_from(i64::try_from(index).ok()?.checked_add(offset)?).ok()?;
        let position = *self.positions.get(&target)?;
        let slots: &'a [TemporalSlot] = self.slots;
        slots[position].members_of(dataset_id)?.first()
    }

    fn resolve(&self, reference: &DatasetRef, index: usize) -> ResolvedOperand {
        let dataset_id = self.conn.qualify(&reference.name);
        let map = self.map_at(&dataset_id, index, reference.offset.time).cloned();
        ResolvedOperand {
            reference: reference.to_string(),
            dataset_id,
            map,
        }
    }

    fn plan_slot(
        &self,
        slot: &TemporalSlot,
        statement: &AlgebraStatement,
        kind: DatasetKind,
        base_datasets: &[String],
        options: &AlgebraOptions,
    ) -> Result<std::result::Result<SlotPlan, SkipReason>> {
        let operands: Vec<ResolvedOperand> = statement
            .expression
            .dataset_refs()
            .into_iter()
            .map(|reference| self.resolve(reference, slot.index))
            .collect();

        if !options.register_null {
            if let Some(missing) = operands.iter().find(|operand| operand.map.is_none()) {
                return Ok(Err(SkipReason::MissingOperand {
                    reference: missing.reference.clone(),
                }));
            }
        } else {
            let has_base = base_datasets.iter().any(|id| {
                slot.members_of(id)
                    .is_some_and(|maps| !maps.is_empty())
            });
            if !has_base {
                return Ok(Err(SkipReason::NoBaseData));
            }
        }

        let present: Vec<&MapEntry> = operands.iter().filter_map(|o| o.map.as_ref()).collect();
        if options.spatial_check && !all_intersect(&present) {
            return Ok(Err(SkipReason::SpatiallyDisjoint));
        }

        let mut leaves = operands.iter();
        let expression = statement.expression.render_with(&mut |leaf| {
            let operand = leaves
                .next()
                .ok_or_else(|| Error::invalid_value("Operand list out of step with expression"))?;
            render_leaf(leaf, operand, kind)
        })?;

        let spatial_extent = present
            .iter()
            .map(|map| map.spatial_extent)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        let output_id = self
            .conn
            .qualify(&format!("{}_{}", options.basename, slot.index));
        let output = kind.new_map_entry(output_id, slot.extent, spatial_extent);

        debug!("Slot {} ({}): {} = {}", slot.index, slot.extent, output.name(), expression);
        Ok(Ok(SlotPlan {
            index: slot.index,
            extent: slot.extent,
            expression,
            operands,
            output,
        }))
    }
}

fn all_intersect(maps: &[&MapEntry]) -> bool {
    maps.iter().enumerate().all(|(i, a)| {
        maps[i + 1..]
            .iter()
            .all(|b| a.spatial_extent.intersects(&b.spatial_extent))
    })
}

fn render_leaf(leaf: &Expr, operand: &ResolvedOperand, kind: DatasetKind) -> Result<String> {
    let Some(map) = &operand.map else {
        return Ok(NULL_LITERAL.to_string());
    };
    match leaf {
        Expr::Dataset(reference) => Ok(match reference.offset.spatial {
            Some(spatial) => format!("{}{}", map.id, spatial_suffix(spatial, kind)),
            None => map.id.clone(),
        }),
        Expr::Function { function, .. } => Ok(format_number(function.apply(&map.extent)?)),
        other => Err(Error::invalid_value(format!("Unexpected leaf {:?}", other))),
    }
}

fn spatial_suffix(offset: SpatialOffset, kind: DatasetKind) -> String {
    if kind.supports_depth() {
        format!("[{},{},{}]", offset.row, offset.col, offset.depth.unwrap_or(0))
    } else {
        format!("[{},{}]", offset.row, offset.col)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
