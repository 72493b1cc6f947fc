//! Shared helpers for integration tests
//!
//! Mirrors the bootstrap pattern used across the workspace's test crates:
//! one call builds a compartment and gate wired for deterministic runs.

use crate::compartment::IpcCompartment;
use crate::fault_injection::FaultPlan;
use crate::gate::CocallGate;
use coport::{Backoff, CoportConfig};
use std::sync::Arc;

/// Builds a compartment and gate with default sizing
pub fn test_bootstrap() -> (Arc<IpcCompartment>, Arc<CocallGate>) {
    (Arc::new(IpcCompartment::new()), Arc::new(CocallGate::new()))
}

/// Builds a compartment with explicit sizing and a bounded backoff
///
/// The bounded policy keeps pipe rendezvous tests deterministic: a missing
/// peer surfaces as `WouldBlock` instead of an unbounded spin.
pub fn test_bootstrap_with(
    config: CoportConfig,
    backoff: Backoff,
) -> (Arc<IpcCompartment>, Arc<CocallGate>) {
    (
        Arc::new(IpcCompartment::with_config(config).with_backoff(backoff)),
        Arc::new(CocallGate::new()),
    )
}

/// Runs a closure against a compartment carrying the given fault plan
pub fn with_fault_plan<F, R>(plan: FaultPlan, f: F) -> R
where
    F: FnOnce(&IpcCompartment) -> R,
{
    let compartment = IpcCompartment::new().with_fault_plan(plan);
    f(&compartment)
}
