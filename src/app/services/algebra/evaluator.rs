//! Evaluation state machine: parse, plan, execute, register
//!
//! ```text
//! PARSED -> PLANNED -> EXECUTING -> COMPLETED
//!              ^  |               \-> FAILED
//!              +--+ (dry run: plan again, never execute)
//! ```

use super::ast::AlgebraStatement;
use super::config::AlgebraOptions;
use super::executor::{SlotFailure, execute_plan};
use super::parser::parse_statement;
use super::planner::{EvaluationPlan, SkippedSlot, plan};
use crate::app::adapters::backend::ComputeBackend;
use crate::app::adapters::map_registry::MapRegistry;
use crate::app::models::MapEntry;
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::{Error, Result};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Parsed,
    Planned,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationState::Parsed => "PARSED",
            EvaluationState::Planned => "PLANNED",
            EvaluationState::Executing => "EXECUTING",
            EvaluationState::Completed => "COMPLETED",
            EvaluationState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Summary of an evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub output_id: String,
    pub state: EvaluationState,
    pub dry_run: bool,
    /// Slots that reached (or, in a dry run, would reach) the backend
    pub planned_slots: usize,
    /// Result maps registered in the output dataset, in slot order
    pub registered: Vec<MapEntry>,
    pub skipped: Vec<SkippedSlot>,
    pub failed: Vec<SlotFailure>,
}

/// One algebra statement on its way through the evaluation states
#[derive(Debug)]
pub struct AlgebraEvaluator {
    statement: AlgebraStatement,
    state: EvaluationState,
    plan: Option<EvaluationPlan>,
}

impl AlgebraEvaluator {
    /// Parse `output = expression`
    pub fn parse(expression: &str) -> Result<Self> {
        let statement = parse_statement(expression)?;
        info!("Parsed algebra statement: {}", statement);
        Ok(Self {
            statement,
            state: EvaluationState::Parsed,
            plan: None,
        })
    }

    pub fn state(&self) -> EvaluationState {
        self.state
    }

    pub fn statement(&self) -> &AlgebraStatement {
        &self.statement
    }

    pub fn plan(&self) -> Option<&EvaluationPlan> {
        self.plan.as_ref()
    }

    /// Resolve the statement against the current store contents.
    ///
    /// Allowed from `Parsed` and, to refresh a dry run, from `Planned`.
    pub fn prepare(
        &mut self,
        conn: &TemporalDatabaseConnection,
        options: &AlgebraOptions,
    ) -> Result<&EvaluationPlan> {
        if !matches!(self.state, EvaluationState::Parsed | EvaluationState::Planned) {
            return Err(Error::invalid_value(format!(
                "Cannot plan an evaluation in state {}",
                self.state
            )));
        }
        let planned = plan(&self.statement, conn, options)?;
        self.state = EvaluationState::Planned;
        Ok(self.plan.insert(planned))
    }

    /// Run the plan and register the results.
    ///
    /// In a dry run nothing is executed or written and the state stays
    /// `Planned`. Results of a cancelled run are registered before the
    /// interruption is reported.
    pub async fn execute(
        &mut self,
        conn: &mut TemporalDatabaseConnection,
        backend: &dyn ComputeBackend,
        registry: &dyn MapRegistry,
        options: &AlgebraOptions,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport> {
        let not_planned = || {
            Error::invalid_value(format!("Cannot execute an evaluation in state {}", self.state))
        };
        if self.state != EvaluationState::Planned {
            return Err(not_planned());
        }
        let Some(plan) = self.plan.as_ref() else {
            return Err(not_planned());
        };

        if options.dry_run {
            info!("Dry run: {} slots planned, nothing executed", plan.slots.len());
            return Ok(report(plan, self.state, true, Vec::new(), Vec::new()));
        }

        self.state = EvaluationState::Executing;
        let outcome = match execute_plan(plan, backend, options, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = EvaluationState::Failed;
                return Err(e);
            }
        };

        let mut outputs = Vec::with_capacity(outcome.completed.len());
        for &position in &outcome.completed {
            let mut output = plan.slots[position].output.clone();
            match registry.get_extent(output.map_type, &output.id).await {
                Ok(Some(extent)) => output.spatial_extent = extent,
                Ok(None) => {}
                Err(e) => warn!(
                    "Using operand extent for <{}>, registry lookup failed: {:#}",
                    output.id, e
                ),
            }
            outputs.push(output);
        }

        if let Err(e) = conn.register_outputs(&plan.output_dataset, &outputs, options.overwrite) {
            self.state = EvaluationState::Failed;
            return Err(e);
        }

        if outcome.cancelled {
            self.state = EvaluationState::Failed;
            return Err(Error::processing_interrupted(format!(
                "{} of {} slots registered in <{}> before cancellation",
                outputs.len(),
                plan.slots.len(),
                plan.output_dataset.id
            )));
        }

        self.state = EvaluationState::Completed;
        if !outcome.failed.is_empty() {
            warn!(
                "{} slot(s) failed and were skipped: {}",
                outcome.failed.len(),
                outcome
                    .failed
                    .iter()
                    .map(|failure| failure.index.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        info!(
            "Registered {} result maps in <{}>",
            outputs.len(),
            plan.output_dataset.id
        );
        Ok(report(plan, self.state, false, outputs, outcome.failed))
    }
}

fn report(
    plan: &EvaluationPlan,
    state: EvaluationState,
    dry_run: bool,
    registered: Vec<MapEntry>,
    failed: Vec<SlotFailure>,
) -> EvaluationReport {
    EvaluationReport {
        output_id: plan.output_dataset.id.clone(),
        state,
        dry_run,
        planned_slots: plan.slots.len(),
        registered,
        skipped: plan.skipped.clone(),
        failed,
    }
}

/// Parse, plan and execute `expression` in one call
pub async fn evaluate(
    expression: &str,
    conn: &mut TemporalDatabaseConnection,
    backend: &dyn ComputeBackend,
    registry: &dyn MapRegistry,
    options: &AlgebraOptions,
    cancel: &CancellationToken,
) -> Result<EvaluationReport> {
    let mut evaluator = AlgebraEvaluator::parse(expression)?;
    evaluator.prepare(conn, options)?;
    evaluator
        .execute(conn, backend, registry, options, cancel)
        .await
}
