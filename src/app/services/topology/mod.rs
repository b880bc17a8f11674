//! Temporal topology between maps
//!
//! Classifies how two temporal extents relate, following Allen's interval
//! algebra extended with point-in-time cases, and builds relation tables
//! between two collections of maps.
//!
//! # Architecture
//!
//! - [`relation`] - The [`Relation`] type and the pairwise [`relate`] function
//! - [`table`] - Relation tables: exhaustive, naive and sweep-line
//!
//! # Touching intervals
//!
//! Intervals are half-open. An interval ending exactly where another starts
//! `meets` it; it never `overlaps` it.

pub mod relation;
pub mod table;

#[cfg(test)]
pub mod tests;

pub use relation::{Relation, relate};
pub use table::{TemporalRelation, build_relation_table, build_relation_table_naive, relate_all};
