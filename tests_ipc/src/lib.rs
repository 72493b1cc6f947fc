//! IPC Test Utilities
//!
//! This crate provides shared utilities for the transport, capability, and
//! poll integration tests.
//!
//! ## Test Philosophy
//!
//! - **No interleaving is observable**: concurrent operations on one coport
//!   never corrupt payload bytes or counts
//! - **At most once, exactly once**: carrier messages are received at most
//!   once and freed exactly once
//! - **Forgeries stop at the gate**: a tampered handle never reaches coport
//!   state
//! - **Deterministic waits**: bounded backoff keeps rendezvous tests fast
//!   and reproducible

use coport::{Backoff, CoportConfig};
use coproc::{CocallGate, IpcCompartment};
use std::sync::Arc;

pub use coproc::test_utils::{test_bootstrap, test_bootstrap_with};

/// Bootstrap with a small table and bounded waits
///
/// Sizes every pool small enough that exhaustion paths are reachable in a
/// few operations, and bounds the pipe spin so a missing peer fails fast.
pub fn test_bootstrap_small() -> (Arc<IpcCompartment>, Arc<CocallGate>) {
    test_bootstrap_with(
        CoportConfig {
            table_slots: 8,
            channel_capacity: 64,
            carrier_slots: 4,
            arena_slots: 16,
        },
        Backoff::bounded(1_000_000),
    )
}

/// Deterministic pseudo-random sequence for property tests
///
/// A linear congruential generator keeps the randomized test sequences
/// reproducible without pulling in an RNG dependency.
#[derive(Debug, Clone)]
pub struct TestRng(u64);

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    /// Returns a value in `[0, bound)`
    pub fn next_below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}
