//! Command-line interface definitions

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::driver::{RunOptions, MAX_WORKERS};
use crate::scenario::SCENARIO_NAMES;

/// Bounded-concurrency gate scenarios: workers sharing fixed pools of slots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scenario to run (repeatable; default: all, in catalog order)
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// List available scenarios and exit
    #[arg(long)]
    pub list: bool,

    /// Number of workers per scenario (default: the scenario's own count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Multiply every simulated hold duration (0 = no delay)
    ///
    /// Useful for quick runs: `--hold-scale 0.1` runs ten times faster.
    #[arg(long, default_value = "1.0")]
    pub hold_scale: f64,

    /// Timeout in milliseconds for scenarios that acquire with a timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// File that receives the entries of the `file-log` scenario
    #[arg(long, default_value = "log_semaforo.txt")]
    pub log_file: PathBuf,

    /// Show progress information
    #[arg(long)]
    pub progress: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - A scenario name is not in the catalog
    /// - The worker count is 0 or above [`MAX_WORKERS`]
    /// - The hold scale is negative or not finite
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        if let Some(unknown) = self
            .scenarios
            .iter()
            .find(|name| !SCENARIO_NAMES.contains(&name.as_str()))
        {
            anyhow::bail!(
                "Unknown scenario: {unknown} (use --list to see available scenarios)"
            );
        }

        if self.workers == Some(0) {
            anyhow::bail!("Worker count must be at least 1");
        }

        if let Some(workers) = self.workers.filter(|&w| w > MAX_WORKERS) {
            anyhow::bail!("Worker count must be at most {MAX_WORKERS}, got: {workers}");
        }

        if !self.hold_scale.is_finite() || self.hold_scale < 0.0 {
            anyhow::bail!(
                "Hold scale must be a non-negative number, got: {}",
                self.hold_scale
            );
        }

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Scenario names to run, duplicates removed, in the order given
    #[must_use]
    pub fn selected_scenarios(&self) -> Vec<String> {
        let mut selected: Vec<String> = Vec::with_capacity(self.scenarios.len());
        for name in &self.scenarios {
            if !selected.contains(name) {
                selected.push(name.clone());
            }
        }
        selected
    }

    /// Driver options derived from the flags
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            hold_scale: self.hold_scale,
            workers_override: self.workers,
            timeout_override: self.timeout_ms.map(Duration::from_millis),
            progress: self.progress,
        }
    }
}
