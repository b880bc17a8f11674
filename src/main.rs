use clap::{CommandFactory, Parser};
use std::process;
use tgis::cli::{args::Args, commands};
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Without a subcommand there is nothing to do but explain the tool
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        // CTRL+C cancels the token; a running algebra evaluation finishes the
        // slots in flight, registers what completed and reports the interruption
        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, finishing running computations...");
                    signal_token.cancel();
                }
                Err(e) => eprintln!("Failed to install CTRL+C signal handler: {}", e),
            }
        });

        commands::run(args, cancellation_token).await
    });

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

/// Show help information and example invocations when no subcommand is provided
fn show_help_and_commands() {
    println!("tgis - Temporal GIS engine");
    println!("==========================");
    println!();
    println!("Manage space time datasets, analyse their temporal topology and");
    println!("evaluate temporal map algebra statements.");
    println!();
    if let Err(e) = Args::command().print_help() {
        eprintln!("Failed to print help: {}", e);
    }
    println!();
    println!("EXAMPLES:");
    println!("    # Create a monthly temperature dataset and register maps:");
    println!("    tgis create temp --title 'Monthly temperature'");
    println!("    tgis register temp --maps t1,t2,t3 --start 2001-01-01 --increment '1 month' -i");
    println!();
    println!("    # Inspect the temporal relations between two datasets:");
    println!("    tgis topology temp precip");
    println!();
    println!("    # Average each month with its neighbours:");
    println!("    tgis algebra -e 'smooth = (temp[-1] + temp + temp[1]) / 3' -b smooth -j 4");
}
