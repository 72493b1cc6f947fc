//! # IPC Compartment
//!
//! This crate implements the compartment that owns the coport table and
//! executes coport operations on behalf of callers reached over the cocall
//! transport.
//!
//! ## Philosophy
//!
//! - **Validate, then act**: every presented handle passes the capability
//!   checks before any coport state is touched; failures produce
//!   `InvalidArgument` with no side effects.
//! - **One way in**: callers enter through the [`CocallGate`], which records
//!   a structured audit event for every operation.
//! - **Shared, not exclusive**: operations take `&self` so a pipe receiver
//!   blocked on one thread never prevents the matching sender on another.

pub mod compartment;
pub mod direct;
pub mod fault_injection;
pub mod gate;
pub mod test_utils;

pub use compartment::IpcCompartment;
pub use direct::DirectCocall;
pub use fault_injection::{FaultInjector, FaultPlan, IoFault};
pub use gate::{CocallAuditLog, CocallEvent, CocallGate};
