//! semgate: run bounded-concurrency gate scenarios
//!
//! Each scenario spawns a handful of worker threads that compete for a gate
//! with a fixed number of slots, do a short simulated unit of work and
//! release the slot.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use semgate::cli::Args;
use semgate::scenario::{self, SCENARIO_NAMES};
use semgate::{FileSink, TracingSink};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    if args.quiet {
        // In quiet mode, only log errors
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::ERROR)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(match args.verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(args.verbose > 0)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    }

    // Validate arguments
    args.validate().context("Invalid arguments")?;

    if args.list {
        let scenarios = scenario::catalog(Arc::new(FileSink::new(&args.log_file)))?;
        for scenario in &scenarios {
            println!(
                "{:<18} {} slot(s), {} worker(s)  {}",
                scenario.name(),
                scenario.gate().capacity(),
                scenario.workers(),
                scenario.description()
            );
        }
        return Ok(());
    }

    info!("Starting semgate v{}", env!("CARGO_PKG_VERSION"));
    let log_file = Arc::new(FileSink::new(&args.log_file));
    info!("Log file: {}", log_file.path().display());
    info!("Hold scale: {}", args.hold_scale);

    let catalog = scenario::catalog(log_file)?;
    let selected = scenario::select(catalog, &args.selected_scenarios())?;
    let reports = semgate::run_all(&selected, &args.run_options(), &TracingSink)
        .context("Scenario run failed")?;

    let timed_out: usize = reports.iter().map(semgate::ScenarioReport::timed_out).sum();
    info!(
        "Ran {} of {} scenarios, {} worker(s) timed out",
        reports.len(),
        SCENARIO_NAMES.len(),
        timed_out
    );

    Ok(())
}
