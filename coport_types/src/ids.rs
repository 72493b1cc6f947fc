//! Unique identifiers for fabric entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a compartment
///
/// Compartments are mutually distrusting units of execution that share an
/// address space. Every cocall into the IPC compartment is attributed to the
/// calling compartment for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompartmentId(Uuid);

impl CompartmentId {
    /// Creates a new random compartment ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a compartment ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CompartmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Compartment({})", self.0)
    }
}

/// Unique identifier for a coport
///
/// The identifier names the endpoint for debugging and directory purposes.
/// It grants no authority; all access goes through sealed handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoportId(Uuid);

impl CoportId {
    /// Creates a new random coport ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a coport ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CoportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CoportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coport({})", self.0)
    }
}
