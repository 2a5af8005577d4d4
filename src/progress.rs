//! Progress tracking and reporting

use indicatif::{ProgressBar, ProgressStyle};

/// Counts finished workers of one scenario
///
/// Hidden unless requested, so callers can always report progress.
#[derive(Clone)]
pub struct ProgressTracker {
    progress_bar: ProgressBar,
}

impl ProgressTracker {
    /// A visible bar for `workers` workers of scenario `name`
    #[must_use]
    pub fn new(name: &str, workers: usize) -> Self {
        let pb = ProgressBar::new(workers as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {prefix:>18} [{wide_bar:.cyan/blue}] {pos}/{len} workers")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_prefix(name.to_string());

        Self { progress_bar: pb }
    }

    /// A tracker that draws nothing
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    pub fn worker_finished(&self) {
        self.progress_bar.inc(1);
    }

    #[must_use]
    pub fn finished_workers(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn finish(&self) {
        self.progress_bar.finish_with_message("done");
    }
}
