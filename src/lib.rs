//! semgate: bounded-concurrency gate scenarios
//!
//! This library runs small scenarios in which worker threads share a resource
//! pool of fixed size through a [`gate_sync::BoundedGate`]: database access,
//! printers, API connections, uploads, a guarded stock counter, a guarded
//! producer/consumer queue and an append-only log file.

pub mod cli;
pub mod driver;
pub mod error;
pub mod progress;
pub mod scenario;
pub mod sink;

// Re-export commonly used types
pub use driver::{run_all, run_scenario, RunOptions, ScenarioReport};
pub use error::{Result, ScenarioError};
pub use scenario::{catalog, AcquireMode, Scenario, Work, WorkOutcome};
pub use sink::{FileSink, MemorySink, Sink, TracingSink};
