//! Transport protocol discriminator

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three coport transport protocols
///
/// The transport type is fixed at creation and recorded both in the coport
/// itself and in every sealed handle that refers to it. A mismatch between
/// the two is a forgery and is rejected before any field is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoportType {
    /// Synchronous rendezvous: one in-flight message, sender copies directly
    /// into the buffer the receiver published
    Pipe,
    /// Byte ring buffer: bounded stream, message boundaries not preserved
    Channel,
    /// Discrete message queue: ring of read-only message references with
    /// explicit free
    Carrier,
}

impl fmt::Display for CoportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoportType::Pipe => write!(f, "Pipe"),
            CoportType::Channel => write!(f, "Channel"),
            CoportType::Carrier => write!(f, "Carrier"),
        }
    }
}
