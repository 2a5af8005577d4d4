//! Bounded admission gates for threaded programs
//!
//! This crate provides a blocking counting gate and two small data structures
//! built on top of it.
//!
//! # Primitives
//!
//! - [`BoundedGate`] - Counting gate that admits at most `capacity` holders
//! - [`GuardedValue`] - Shared value reachable only inside a critical section
//! - [`GuardedQueue`] - FIFO queue whose operations are serialized by a gate
//!
//! # Example
//!
//! ```rust,no_run
//! use gate_sync::BoundedGate;
//! use std::thread;
//!
//! let gate = BoundedGate::new(100).unwrap();
//!
//! // Spawn many threads, but only 100 run the critical section concurrently
//! thread::scope(|s| {
//!     for i in 0..1000 {
//!         let gate = &gate;
//!         s.spawn(move || {
//!             let _permit = gate.acquire();
//!             println!("Task {}", i);
//!         });
//!     }
//! });
//! ```

mod error;
mod gate;
mod guarded;
mod queue;

pub use error::{GateError, Result};
pub use gate::{AcquireOutcome, BoundedGate, GatePermit};
pub use guarded::GuardedValue;
pub use queue::GuardedQueue;
