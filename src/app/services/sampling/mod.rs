//! Sampling of space-time datasets onto shared time slots
//!
//! A sampling run partitions the time line into slots and decides, for every
//! slot and every input dataset, which maps take part in it.
//!
//! # Architecture
//!
//! - [`method`] - Sampling methods and the temporal relations each accepts
//! - [`grid`] - Regular slot grids derived from a granularity
//! - [`sampler`] - Assignment of maps to slots, by grid or by a sampler dataset
//!
//! # Slot indices
//!
//! Every slot keeps its position on the grid even when slots without data
//! are dropped, so neighbour offsets and output names stay stable.

pub mod grid;
pub mod method;
pub mod sampler;

#[cfg(test)]
pub mod tests;

pub use grid::build_slot_grid;
pub use method::{MethodSet, SamplingMethod};
pub use sampler::{SlotMembers, TemporalSlot, sample, sample_by_dataset};
