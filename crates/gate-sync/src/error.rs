//! Error handling and types

use thiserror::Error;

/// Errors raised while configuring gates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// A gate needs at least one slot
    #[error("Invalid configuration: gate capacity must be at least 1, got {capacity}")]
    InvalidConfiguration {
        /// The rejected capacity
        capacity: usize,
    },
}

pub type Result<T> = std::result::Result<T, GateError>;
