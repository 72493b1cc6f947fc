//! # Cocall API
//!
//! This crate defines the boundary between compartments and the IPC
//! compartment that implements coport operations.
//!
//! ## Philosophy
//!
//! The synchronous cross-compartment call primitive is an external
//! collaborator: all this crate knows is that a fixed-shape request goes in
//! and a fixed-shape reply comes out, synchronously. Everything a caller can
//! ask for is a [`CoportRequest`]; everything it can learn is a
//! [`CoportReply`].

pub mod request;
pub mod transport;

pub use request::{CoportReply, CoportRequest};
pub use transport::CocallTransport;
