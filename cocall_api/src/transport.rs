//! The cocall transport seam

use crate::request::{CoportReply, CoportRequest};
use coport_types::IpcError;

/// Synchronous request/reply transport to the IPC compartment
///
/// Multiple implementations are possible:
/// - Direct in-process dispatch (for tests and co-located compartments)
/// - A real cross-compartment trampoline (the external blocking primitive)
///
/// # Design Principles
///
/// **Synchronous**: `call` blocks until the reply is produced; there is no
/// queueing at this layer.
///
/// **Opaque**: callers learn nothing about the far side beyond the reply.
/// Capability validation happens behind this boundary, so a hostile caller
/// gains nothing by speaking the transport directly.
///
/// **Shared**: transports take `&self`; a single transport may be driven
/// from many threads at once (a blocked pipe receive on one thread must not
/// prevent the matching send on another).
pub trait CocallTransport {
    /// Delivers one request and returns its reply
    fn call(&self, request: CoportRequest) -> Result<CoportReply, IpcError>;
}
