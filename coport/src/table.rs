//! Coport table: bounded home of every live endpoint
//!
//! Handles address coports by table index, expressed as bounds over a
//! logical region of `capacity * COPORT_RECORD_SIZE` units. Dereferencing
//! goes through [`CoportTable::get`], which re-checks membership and the
//! type tag even after a handle has unsealed cleanly.

use crate::record::Coport;
use coport_types::{
    CoportHandle, CoportType, HandleBounds, IpcError, UnsealedRef, COPORT_RECORD_SIZE,
};
use std::sync::{Arc, PoisonError, RwLock};

/// Sizing knobs for a fabric instance
#[derive(Debug, Clone)]
pub struct CoportConfig {
    /// Maximum number of live coports
    pub table_slots: usize,
    /// Ring capacity in bytes for each channel coport
    pub channel_capacity: usize,
    /// Message slots in each carrier ring
    pub carrier_slots: usize,
    /// Message slots in the shared arena
    pub arena_slots: usize,
}

impl Default for CoportConfig {
    fn default() -> Self {
        Self {
            table_slots: 64,
            channel_capacity: 4096,
            carrier_slots: 16,
            arena_slots: 256,
        }
    }
}

/// Bounded table of live coports
pub struct CoportTable {
    capacity: usize,
    ports: RwLock<Vec<Arc<Coport>>>,
}

impl CoportTable {
    /// Creates a table with room for `capacity` coports
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ports: RwLock::new(Vec::new()),
        }
    }

    /// Returns the extent of the table region in logical units
    pub fn extent(&self) -> usize {
        self.capacity * COPORT_RECORD_SIZE
    }

    /// Returns the number of live coports
    pub fn len(&self) -> usize {
        self.ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether the table holds no coports
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a coport and mints its unsealed handle
    pub fn create(
        &self,
        transport: CoportType,
        config: &CoportConfig,
    ) -> Result<(CoportHandle, Arc<Coport>), IpcError> {
        let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
        if ports.len() >= self.capacity {
            return Err(IpcError::ResourceExhausted);
        }
        let port = Arc::new(match transport {
            CoportType::Pipe => Coport::pipe(),
            CoportType::Channel => Coport::channel(config.channel_capacity),
            CoportType::Carrier => Coport::carrier(config.carrier_slots),
        });
        let index = ports.len();
        ports.push(port.clone());
        let handle = CoportHandle::unsealed(HandleBounds::for_index(index), transport);
        Ok((handle, port))
    }

    /// Dereferences an unsealed reference
    ///
    /// The reference's type tag must match the transport recorded in the
    /// coport; a mismatch is a forgery and fails before any port state is
    /// touched.
    pub fn get(&self, unsealed: &UnsealedRef) -> Result<Arc<Coport>, IpcError> {
        let ports = self.ports.read().unwrap_or_else(PoisonError::into_inner);
        let port = ports
            .get(unsealed.index())
            .cloned()
            .ok_or(IpcError::InvalidArgument)?;
        if port.transport() != unsealed.transport() {
            return Err(IpcError::InvalidArgument);
        }
        Ok(port)
    }
}
