//! In-process cocall transport

use crate::compartment::IpcCompartment;
use crate::gate::CocallGate;
use cocall_api::{CocallTransport, CoportReply, CoportRequest};
use coport_types::{CompartmentId, IpcError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Direct dispatch into a co-located [`IpcCompartment`]
///
/// The production transport is an external blocking trampoline; this
/// implementation serves tests and compartments that share a process with
/// the IPC compartment. Requests are stamped with a monotonic counter in
/// place of a hardware timestamp.
pub struct DirectCocall {
    compartment: Arc<IpcCompartment>,
    gate: Arc<CocallGate>,
    caller: CompartmentId,
    clock: AtomicU64,
}

impl DirectCocall {
    /// Creates a transport attributed to `caller`
    pub fn new(
        compartment: Arc<IpcCompartment>,
        gate: Arc<CocallGate>,
        caller: CompartmentId,
    ) -> Self {
        Self {
            compartment,
            gate,
            caller,
            clock: AtomicU64::new(0),
        }
    }

    /// Returns the calling compartment this transport is bound to
    pub fn caller(&self) -> CompartmentId {
        self.caller
    }
}

impl CocallTransport for DirectCocall {
    fn call(&self, request: CoportRequest) -> Result<CoportReply, IpcError> {
        let timestamp = self.clock.fetch_add(1, Ordering::Relaxed);
        self.gate
            .execute(&self.compartment, self.caller, request, timestamp)
    }
}
