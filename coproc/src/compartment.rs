//! Compartment state and operation implementations

use crate::fault_injection::{FaultInjector, FaultPlan};
use coport::{copoll, Backoff, CarrierMessage, Coport, CoportConfig, CoportTable, MsgArena, MsgRef, PollEntry, Timeout};
use coport_types::{
    validate, CapabilityAuditLog, CapabilityEvent, CoportHandle, CoportType, EventMask, IpcError,
    SealingAuthority,
};
use services_namespace::{InMemoryNamespace, NamespaceDirectory, NamespaceError, MAX_NAME_LEN};
use std::sync::{Arc, Mutex, PoisonError};

/// The compartment that owns all coport state
///
/// Holds the table, the message arena, the three sealing authorities, and
/// the namespace adapter. Every public operation corresponds to one
/// [`cocall_api::CoportRequest`] variant.
pub struct IpcCompartment {
    config: CoportConfig,
    table: CoportTable,
    arena: MsgArena,
    pipe_authority: SealingAuthority,
    channel_authority: SealingAuthority,
    carrier_authority: SealingAuthority,
    namespace: Mutex<Box<dyn NamespaceDirectory>>,
    capability_audit: Mutex<CapabilityAuditLog>,
    backoff: Backoff,
    fault_injector: Option<FaultInjector>,
}

impl IpcCompartment {
    /// Creates a compartment with default sizing and an in-memory namespace
    pub fn new() -> Self {
        Self::with_config(CoportConfig::default())
    }

    /// Creates a compartment with explicit sizing
    pub fn with_config(config: CoportConfig) -> Self {
        let mut audit = CapabilityAuditLog::new();
        let pipe_authority = SealingAuthority::mint(CoportType::Pipe);
        let channel_authority = SealingAuthority::mint(CoportType::Channel);
        let carrier_authority = SealingAuthority::mint(CoportType::Carrier);
        for transport in [CoportType::Pipe, CoportType::Channel, CoportType::Carrier] {
            audit.record(CapabilityEvent::Minted { transport });
        }
        Self {
            table: CoportTable::with_capacity(config.table_slots),
            arena: MsgArena::with_capacity(config.arena_slots),
            pipe_authority,
            channel_authority,
            carrier_authority,
            namespace: Mutex::new(Box::new(InMemoryNamespace::new())),
            capability_audit: Mutex::new(audit),
            backoff: Backoff::unbounded(),
            fault_injector: None,
            config,
        }
    }

    /// Replaces the namespace directory
    pub fn with_namespace(mut self, namespace: Box<dyn NamespaceDirectory>) -> Self {
        self.namespace = Mutex::new(namespace);
        self
    }

    /// Replaces the backoff policy used by pipe rendezvous waits
    ///
    /// Tests install a bounded policy so rendezvous failures are
    /// deterministic instead of unbounded spins.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Installs a fault injector (test-only)
    ///
    /// Injected faults fire on the send/receive paths and raise the
    /// affected endpoint's `SendErr`/`RecvErr` readiness bit.
    pub fn with_fault_plan(mut self, plan: FaultPlan) -> Self {
        self.fault_injector = Some(FaultInjector::new(plan));
        self
    }

    /// Returns the configured sizing
    pub fn config(&self) -> &CoportConfig {
        &self.config
    }

    /// Returns a snapshot of the capability audit events
    pub fn capability_events(&self) -> Vec<CapabilityEvent> {
        self.capability_audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events()
            .to_vec()
    }

    fn authority_for(&self, transport: CoportType) -> &SealingAuthority {
        match transport {
            CoportType::Pipe => &self.pipe_authority,
            CoportType::Channel => &self.channel_authority,
            CoportType::Carrier => &self.carrier_authority,
        }
    }

    fn record_rejection(&self, transport: CoportType, reason: String) {
        self.capability_audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(CapabilityEvent::Rejected { transport, reason });
    }

    /// Validates and unseals a presented handle, then dereferences it
    ///
    /// Fail-closed: any capability-layer failure surfaces as
    /// `InvalidArgument` before the coport is touched.
    fn resolve(&self, handle: &CoportHandle) -> Result<Arc<Coport>, IpcError> {
        if let Err(err) = validate(handle, self.table.extent()) {
            self.record_rejection(handle.transport(), err.to_string());
            return Err(IpcError::InvalidArgument);
        }
        let unsealed = match self.authority_for(handle.transport()).unseal(handle) {
            Ok(unsealed) => unsealed,
            Err(err) => {
                self.record_rejection(handle.transport(), err.to_string());
                return Err(IpcError::InvalidArgument);
            }
        };
        self.capability_audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(CapabilityEvent::Unsealed {
                transport: handle.transport(),
            });
        self.table.get(&unsealed)
    }

    /// Resolves `name` to a sealed handle, creating the endpoint on miss
    ///
    /// Races safely against concurrent creators: a lost insert is treated
    /// as success and the name is re-resolved.
    pub fn open(&self, name: &str, transport: CoportType) -> Result<CoportHandle, IpcError> {
        if name.len() > MAX_NAME_LEN {
            return Err(IpcError::NameTooLong);
        }
        loop {
            {
                let namespace = self.namespace.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(existing) = namespace.resolve(name) {
                    if existing.transport() != transport {
                        return Err(IpcError::InvalidArgument);
                    }
                    return Ok(existing);
                }
            }

            let (raw, _port) = self.table.create(transport, &self.config)?;
            let sealed = self
                .authority_for(transport)
                .seal(raw)
                .map_err(|_| IpcError::InvalidArgument)?;
            self.capability_audit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(CapabilityEvent::Sealed { transport });

            let mut namespace = self.namespace.lock().unwrap_or_else(PoisonError::into_inner);
            match namespace.insert(name, sealed) {
                Ok(()) => return Ok(sealed),
                Err(NamespaceError::AlreadyExists(_)) => continue,
                Err(NamespaceError::NotFound(_)) => return Err(IpcError::InvalidArgument),
            }
        }
    }

    /// Sends `payload` through the endpoint
    pub fn send(&self, handle: &CoportHandle, payload: &[u8]) -> Result<usize, IpcError> {
        let port = self.resolve(handle)?;
        if let Some(injector) = &self.fault_injector {
            if injector.take_send_fault() {
                // Accepted but dropped in flight; the far side sees the
                // fault bit instead of the payload.
                port.raise_error(EventMask::SEND_ERR);
                return Ok(payload.len());
            }
        }
        match port.transport() {
            CoportType::Pipe => port.pipe_send(payload, &self.backoff),
            CoportType::Channel => port.channel_send(payload),
            CoportType::Carrier => port.carrier_send(&self.arena, payload, Vec::new()),
        }
    }

    /// Sends a carrier message with out-of-band handle attachments
    pub fn send_with_attachments(
        &self,
        handle: &CoportHandle,
        payload: &[u8],
        attachments: Vec<CoportHandle>,
    ) -> Result<usize, IpcError> {
        let port = self.resolve(handle)?;
        if port.transport() != CoportType::Carrier {
            return Err(IpcError::InvalidArgument);
        }
        port.carrier_send(&self.arena, payload, attachments)
    }

    /// Receives bytes from a pipe or channel endpoint
    pub fn recv(&self, handle: &CoportHandle, buf: &mut [u8]) -> Result<usize, IpcError> {
        let port = self.resolve(handle)?;
        if self.take_recv_fault(&port) {
            return Err(IpcError::WouldBlock);
        }
        match port.transport() {
            CoportType::Pipe => port.pipe_recv(buf, &self.backoff),
            CoportType::Channel => port.channel_recv(buf),
            CoportType::Carrier => Err(IpcError::InvalidArgument),
        }
    }

    /// Receives a carrier message by reference
    pub fn recv_message(
        &self,
        handle: &CoportHandle,
    ) -> Result<(MsgRef, Vec<CoportHandle>), IpcError> {
        let port = self.resolve(handle)?;
        if self.take_recv_fault(&port) {
            return Err(IpcError::WouldBlock);
        }
        port.carrier_recv(&self.arena)
    }

    fn take_recv_fault(&self, port: &Coport) -> bool {
        match &self.fault_injector {
            Some(injector) if injector.take_recv_fault() => {
                port.raise_error(EventMask::RECV_ERR);
                true
            }
            _ => false,
        }
    }

    /// Reads a received carrier message in place
    pub fn read_message(&self, message: MsgRef) -> Result<Arc<CarrierMessage>, IpcError> {
        self.arena.read(message)
    }

    /// Frees a received carrier message, exactly once
    pub fn free(&self, handle: &CoportHandle, message: MsgRef) -> Result<(), IpcError> {
        let port = self.resolve(handle)?;
        port.carrier_free(&self.arena, message)
    }

    /// Waits for readiness across endpoints
    pub fn poll(
        &self,
        entries: &[(CoportHandle, EventMask)],
        timeout: Timeout,
    ) -> Result<Vec<EventMask>, IpcError> {
        let mut resolved = Vec::with_capacity(entries.len());
        for (handle, interest) in entries {
            resolved.push(PollEntry {
                port: self.resolve(handle)?,
                interest: *interest,
            });
        }
        copoll(&resolved, timeout)
    }

    /// Closes the endpoint, waking all blocked operations
    ///
    /// The directory entry is left in place; unbinding is a directory-layer
    /// decision.
    pub fn close(&self, handle: &CoportHandle) -> Result<(), IpcError> {
        let port = self.resolve(handle)?;
        port.close();
        Ok(())
    }
}

impl Default for IpcCompartment {
    fn default() -> Self {
        Self::new()
    }
}
