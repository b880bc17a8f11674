//! Temporal algebra command

use super::shared::{map_json, map_registry, print_json};
use crate::app::adapters::backend::{CommandBackend, ComputeBackend};
use crate::app::adapters::map_registry::MapRegistry;
use crate::app::services::algebra::{AlgebraEvaluator, AlgebraOptions, EvaluationReport};
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::cli::args::{AlgebraArgs, OutputFormat};
use crate::config::Config;
use crate::Result;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Algebra options from the configuration and the command line flags
pub fn algebra_options(args: &AlgebraArgs, config: &Config, show_progress: bool) -> AlgebraOptions {
    let mut options = AlgebraOptions::from_compute(args.basename.clone(), &config.compute)
        .with_methods(args.method.clone());
    if let Some(granularity) = &args.granularity {
        options = options.with_granularity(granularity.clone());
    }
    if args.register_null {
        options = options.with_register_null();
    }
    if args.spatial {
        options = options.with_spatial_check();
    }
    if args.overwrite {
        options = options.with_overwrite();
    }
    if args.dry_run {
        options = options.with_dry_run();
    }
    if show_progress {
        options = options.with_progress();
    }
    options
}

pub async fn run_algebra(
    args: &AlgebraArgs,
    conn: &mut TemporalDatabaseConnection,
    config: &Config,
    format: OutputFormat,
    show_progress: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let options = algebra_options(args, config, show_progress);
    let backend = CommandBackend::new(&config.compute);
    let registry = map_registry(config);
    let report = evaluate_statement(
        &args.expression,
        conn,
        &backend,
        registry.as_ref(),
        &options,
        cancel,
    )
    .await?;
    print_report(&report, format)
}

/// Parse, plan and execute one statement; a dry run lists the planned
/// backend statements instead of running them
pub async fn evaluate_statement(
    expression: &str,
    conn: &mut TemporalDatabaseConnection,
    backend: &dyn ComputeBackend,
    registry: &dyn MapRegistry,
    options: &AlgebraOptions,
    cancel: &CancellationToken,
) -> Result<EvaluationReport> {
    let mut evaluator = AlgebraEvaluator::parse(expression)?;
    let plan = evaluator.prepare(conn, options)?;
    info!(
        "Planned {} slot(s) for <{}> from {}",
        plan.slots.len(),
        plan.output_dataset.id,
        plan.inputs.join(", ")
    );
    if options.dry_run {
        for request in plan.requests(options.overwrite) {
            info!("[dry run] slot {} ({}): {}", request.slot, request.extent, request.statement());
        }
    }
    evaluator.execute(conn, backend, registry, options, cancel).await
}

fn print_report(report: &EvaluationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            let state = if report.failed.is_empty() {
                report.state.to_string().green().bold()
            } else {
                report.state.to_string().yellow().bold()
            };
            println!("{} <{}>", state, report.output_id);
            if report.dry_run {
                println!("   {} slot(s) planned, nothing executed", report.planned_slots);
            } else {
                println!(
                    "   {} of {} planned slot(s) registered",
                    report.registered.len(),
                    report.planned_slots
                );
            }
            for map in &report.registered {
                println!("   {} {}", map.id, map.extent.to_string().dimmed());
            }
            if !report.skipped.is_empty() {
                println!("{}", format!("Skipped slots: {}", report.skipped.len()).dimmed());
                for skipped in &report.skipped {
                    println!("   slot {} ({}): {}", skipped.index, skipped.extent, skipped.reason);
                }
            }
            if !report.failed.is_empty() {
                println!("{}", format!("Failed slots: {}", report.failed.len()).red());
                for failure in &report.failed {
                    println!("   slot {} ({}): {}", failure.index, failure.extent, failure.message);
                }
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "output": report.output_id,
            "state": report.state.to_string(),
            "dry_run": report.dry_run,
            "planned_slots": report.planned_slots,
            "registered": report.registered.iter().map(map_json).collect::<Vec<_>>(),
            "skipped": report
                .skipped
                .iter()
                .map(|skipped| serde_json::json!({
                    "index": skipped.index,
                    "extent": skipped.extent.to_string(),
                    "reason": skipped.reason.to_string(),
                }))
                .collect::<Vec<_>>(),
            "failed": report
                .failed
                .iter()
                .map(|failure| serde_json::json!({
                    "index": failure.index,
                    "extent": failure.extent,
                    "message": failure.message,
                }))
                .collect::<Vec<_>>(),
        }))?,
        OutputFormat::Csv => {
            println!("status,slot,detail");
            for map in &report.registered {
                println!("registered,,{}", map.id);
            }
            for skipped in &report.skipped {
                println!("skipped,{},{}", skipped.index, skipped.reason);
            }
            for failure in &report.failed {
                println!("failed,{},{}", failure.index, failure.message);
            }
        }
    }
    Ok(())
}
