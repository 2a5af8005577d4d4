//! Common test helpers for integration tests

#![allow(dead_code)]

use gate_sync::BoundedGate;
use semgate::RunOptions;

/// Run options with every simulated delay disabled
pub fn instant_options() -> RunOptions {
    RunOptions {
        hold_scale: 0.0,
        ..RunOptions::default()
    }
}

/// Spin until `gate` reports at least `count` blocked callers
pub fn wait_for_waiters(gate: &BoundedGate, count: usize) {
    while gate.waiting() < count {
        std::thread::yield_now();
    }
}
