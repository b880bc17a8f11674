//! Temporal map algebra over space-time datasets
//!
//! Evaluates statements such as `D = A[-1] + A[1]`: every dataset reference
//! is resolved slot by slot on a common time grid, each slot becomes one
//! backend computation, and the results are registered as a new dataset.
//!
//! # Architecture
//!
//! - [`lexer`] - Tokens with character positions for error reporting
//! - [`ast`] - Statements, expressions, neighbour offsets and temporal functions
//! - [`parser`] - Reentrant recursive-descent parser
//! - [`planner`] - Snapshot, sampling and per-slot operand resolution
//! - [`executor`] - Bounded concurrent backend dispatch with cancellation
//! - [`evaluator`] - The evaluation state machine and result registration
//! - [`config`] - Evaluation options
//!
//! # Null policy
//!
//! A slot whose operand has no map is skipped unless null registration is
//! requested. With null registration the missing operand becomes `null()`,
//! and the slot still needs a map from at least one unshifted dataset.

pub mod ast;
pub mod config;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;

#[cfg(test)]
pub mod tests;

pub use ast::{AlgebraStatement, DatasetRef, Expr, NeighborOffset, TemporalFunction};
pub use config::AlgebraOptions;
pub use evaluator::{AlgebraEvaluator, EvaluationReport, EvaluationState, evaluate};
pub use executor::{ExecutionOutcome, SlotFailure, execute_plan};
pub use parser::{parse_expression, parse_statement};
pub use planner::{EvaluationPlan, SkipReason, SkippedSlot, SlotPlan, plan};
