//! Execution: one backend call per planned slot
//!
//! Slots are dispatched through a bounded `buffer_unordered` pool of `nprocs`
//! in-flight calls. Completions are collected in a buffer keyed by slot so the
//! result order is the slot order whatever the completion order. The
//! cancellation token is checked before every dispatch; in-flight calls are
//! left to finish.

use super::config::AlgebraOptions;
use super::planner::EvaluationPlan;
use crate::Result;
use crate::app::adapters::backend::ComputeBackend;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A slot whose backend call failed while failures were being skipped
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFailure {
    pub index: usize,
    pub extent: String,
    pub message: String,
}

/// What happened to the planned slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// Positions in `plan.slots` that succeeded, in slot order
    pub completed: Vec<usize>,
    /// Failed slots, in slot order
    pub failed: Vec<SlotFailure>,
    /// True if cancellation stopped dispatch before every slot ran
    pub cancelled: bool,
}

/// Run the backend for every planned slot.
///
/// Without `skip_failures` the first failure stops dispatch and is returned;
/// calls still in flight are dropped.
pub async fn execute_plan(
    plan: &EvaluationPlan,
    backend: &dyn ComputeBackend,
    options: &AlgebraOptions,
    cancel: &CancellationToken,
) -> Result<ExecutionOutcome> {
    let requests = plan.requests(options.overwrite);
    let nprocs = options.nprocs.max(1);
    let progress = slot_progress(requests.len(), options.show_progress);
    info!(
        "Executing {} slots for <{}> with {} concurrent backend call(s)",
        requests.len(),
        plan.output_dataset.id,
        nprocs
    );
    let cores = num_cpus::get();
    if nprocs > cores {
        warn!("{} concurrent backend calls on {} CPU cores", nprocs, cores);
    }

    let mut results = stream::iter(requests.iter().enumerate())
        .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
        .map(|(position, request)| async move {
            debug!("Dispatching slot {}", request.slot);
            (position, backend.evaluate(request).await)
        })
        .buffer_unordered(nprocs);

    let mut completed = BTreeSet::new();
    let mut failed = Vec::new();
    while let Some((position, result)) = results.next().await {
        progress.inc(1);
        let request = &requests[position];
        match result {
            Ok(()) => {
                debug!("Slot {} finished: {}", request.slot, request.output_name);
                completed.insert(position);
            }
            Err(e) => {
                error!("Slot {} ({}) failed: {:#}", request.slot, request.extent, e);
                if !options.skip_failures {
                    progress.abandon_with_message(format!("slot {} failed", request.slot));
                    return Err(e);
                }
                failed.push(SlotFailure {
                    index: request.slot,
                    extent: request.extent.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    drop(results);

    failed.sort_by_key(|failure| failure.index);
    let finished = completed.len() + failed.len();
    let cancelled = finished < requests.len();
    if cancelled {
        warn!(
            "Cancelled after {} of {} slots; no further slots dispatched",
            finished,
            requests.len()
        );
        progress.abandon_with_message("cancelled");
    } else {
        progress.finish_with_message("done");
    }

    Ok(ExecutionOutcome {
        completed: completed.into_iter().collect(),
        failed,
        cancelled,
    })
}

fn slot_progress(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} slots ({percent}%) | {msg}")
        .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("computing");
    pb
}
