//! # Coport Core Types
//!
//! This crate defines the fundamental types shared by every layer of the
//! coport IPC fabric.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: handles are typed per transport and cannot
//!   be confused with one another.
//! - **Fail closed**: a handle that does not validate is never dereferenced.
//! - **No ambient authority**: every operation presents a sealed handle; the
//!   sealing keys never leave the compartment that minted them.
//!
//! ## Key Types
//!
//! - [`CoportHandle`]: a sealed, bounds- and type-checked coport reference
//! - [`SealingAuthority`]: the per-transport minting/sealing authority
//! - [`CoportType`]: the three transport protocols
//! - [`EventMask`]: per-coport readiness bits
//! - [`IpcError`]: the operation-level error taxonomy

pub mod capability;
pub mod error;
pub mod event;
pub mod ids;
pub mod transport;

pub use capability::{
    validate, CapabilityAuditLog, CapabilityError, CapabilityEvent, CoportHandle, HandleBounds,
    SealingAuthority, UnsealedRef, COPORT_RECORD_SIZE,
};
pub use error::IpcError;
pub use event::EventMask;
pub use ids::{CompartmentId, CoportId};
pub use transport::CoportType;
