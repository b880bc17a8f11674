//! Command implementations for the tgis CLI
//!
//! Every subcommand lives in its own module; this module performs the
//! common setup (argument validation, layered configuration, logging,
//! opening the metadata store) and dispatches.
//!
//! - `datasets`: create, remove, list and describe space time datasets
//! - `register`: attach maps to and detach maps from a dataset
//! - `analysis`: temporal topology, granularity and sampling reports
//! - `algebra`: evaluate temporal algebra statements

pub mod algebra;
pub mod analysis;
pub mod datasets;
pub mod register;
pub mod shared;

use crate::cli::args::{Args, Commands};
use crate::{Error, Result};
use indicatif::HumanDuration;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Main command runner
///
/// The metadata store is closed after the command, also when it failed; the
/// command's own error wins over a failure to close.
pub async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let start_time = Instant::now();

    args.validate()?;
    let config = shared::load_configuration(&args)?;
    shared::setup_logging(&args, &config.logging)?;
    debug!("Loaded configuration: {:?}", config);

    let Some(command) = &args.command else {
        return Err(Error::configuration("No command given (see --help)"));
    };

    let mut conn = shared::open_database(&config)?;
    let format = args.output_format;
    let result = match command {
        Commands::Create(create) => datasets::run_create(create, &mut conn, format),
        Commands::Remove(remove) => datasets::run_remove(remove, &mut conn, format),
        Commands::List(list) => datasets::run_list(list, &conn, format),
        Commands::Info(info) => datasets::run_info(info, &conn, format),
        Commands::Register(register) => {
            let registry = shared::map_registry(&config);
            register::run_register(
                register,
                &mut conn,
                registry.as_ref(),
                format,
                args.show_progress(),
            )
            .await
        }
        Commands::Unregister(unregister) => register::run_unregister(unregister, &mut conn, format),
        Commands::Topology(topology) => analysis::run_topology(topology, &conn, format),
        Commands::Granularity(granularity) => analysis::run_granularity(granularity, &conn, format),
        Commands::Sample(sample) => analysis::run_sample(sample, &conn, format),
        Commands::Algebra(algebra) => {
            algebra::run_algebra(
                algebra,
                &mut conn,
                &config,
                format,
                args.show_progress(),
                &cancel,
            )
            .await
        }
    };

    let closed = conn.close();
    info!("Finished in {}", HumanDuration(start_time.elapsed()));
    result.and(closed)
}
