//! Error handling and types

use thiserror::Error;

/// Errors raised while running scenarios
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A gate could not be built
    #[error(transparent)]
    Gate(#[from] gate_sync::GateError),

    /// Requested scenario does not exist in the catalog
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing to an output sink failed
    #[error("Sink error ({target}): {source}")]
    Sink {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked while holding or waiting for a slot
    #[error("Worker {worker} of scenario '{scenario}' panicked")]
    WorkerPanicked { scenario: String, worker: usize },
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
