//! Cocall gate: the single entry point into the IPC compartment
//!
//! Every request arriving over the cocall transport passes through the
//! gate, which attributes it to the calling compartment, dispatches it, and
//! records a structured audit event for the invocation and its outcome.

use crate::compartment::IpcCompartment;
use cocall_api::{CoportReply, CoportRequest};
use coport_types::{CompartmentId, CoportType, IpcError};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Gate audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CocallEvent {
    /// An operation was invoked
    Invoked {
        caller: CompartmentId,
        operation: String,
        timestamp_nanos: u64,
    },
    /// An operation completed successfully
    Completed {
        caller: CompartmentId,
        operation: String,
        timestamp_nanos: u64,
    },
    /// An operation was rejected
    Rejected {
        caller: CompartmentId,
        operation: String,
        reason: String,
        timestamp_nanos: u64,
    },
}

/// Audit log for gate operations
#[derive(Debug, Clone, Default)]
pub struct CocallAuditLog {
    events: Vec<CocallEvent>,
}

impl CocallAuditLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: CocallEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[CocallEvent] {
        &self.events
    }

    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&CocallEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CocallEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// The gate in front of an [`IpcCompartment`]
pub struct CocallGate {
    audit: Mutex<CocallAuditLog>,
}

impl CocallGate {
    pub fn new() -> Self {
        Self {
            audit: Mutex::new(CocallAuditLog::new()),
        }
    }

    /// Returns a snapshot of the audit events
    pub fn audit_events(&self) -> Vec<CocallEvent> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events()
            .to_vec()
    }

    /// Clears the audit log (test-only)
    pub fn clear_audit_log(&self) {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, event: CocallEvent) {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event);
    }

    /// Executes a request on behalf of a calling compartment
    ///
    /// This is the only entry point from other compartments: it validates
    /// nothing itself (the compartment's capability layer does), but it
    /// guarantees that every invocation and outcome is attributed and
    /// recorded.
    pub fn execute(
        &self,
        compartment: &IpcCompartment,
        caller: CompartmentId,
        request: CoportRequest,
        timestamp_nanos: u64,
    ) -> Result<CoportReply, IpcError> {
        let operation = request.name().to_string();
        self.record(CocallEvent::Invoked {
            caller,
            operation: operation.clone(),
            timestamp_nanos,
        });

        let result = dispatch(compartment, request);

        match &result {
            Ok(_) => self.record(CocallEvent::Completed {
                caller,
                operation,
                timestamp_nanos,
            }),
            Err(err) => self.record(CocallEvent::Rejected {
                caller,
                operation,
                reason: err.to_string(),
                timestamp_nanos,
            }),
        }
        result
    }
}

impl Default for CocallGate {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(
    compartment: &IpcCompartment,
    request: CoportRequest,
) -> Result<CoportReply, IpcError> {
    match request {
        CoportRequest::Open { name, transport } => {
            let handle = compartment.open(&name, transport)?;
            Ok(CoportReply::Opened { handle })
        }
        CoportRequest::Send { handle, payload } => {
            let bytes = compartment.send(&handle, &payload)?;
            Ok(CoportReply::Sent { bytes })
        }
        CoportRequest::SendMessage {
            handle,
            payload,
            attachments,
        } => {
            let bytes = compartment.send_with_attachments(&handle, &payload, attachments)?;
            Ok(CoportReply::Sent { bytes })
        }
        CoportRequest::Recv { handle, len_hint } => {
            if handle.transport() == CoportType::Carrier {
                let (message, attachments) = compartment.recv_message(&handle)?;
                Ok(CoportReply::Message {
                    message,
                    attachments,
                })
            } else {
                let mut payload = vec![0u8; len_hint];
                let n = compartment.recv(&handle, &mut payload)?;
                payload.truncate(n);
                Ok(CoportReply::Received { payload })
            }
        }
        CoportRequest::Free { handle, message } => {
            compartment.free(&handle, message)?;
            Ok(CoportReply::Freed)
        }
        CoportRequest::Poll { entries, timeout } => {
            let observed = compartment.poll(&entries, timeout)?;
            Ok(CoportReply::Polled { observed })
        }
        CoportRequest::Close { handle } => {
            compartment.close(&handle)?;
            Ok(CoportReply::Closed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coport_types::{CoportHandle, HandleBounds};

    #[test]
    fn test_gate_records_completion() {
        let gate = CocallGate::new();
        let compartment = IpcCompartment::new();
        let caller = CompartmentId::new();

        let reply = gate
            .execute(
                &compartment,
                caller,
                CoportRequest::Open {
                    name: "audited".to_string(),
                    transport: CoportType::Channel,
                },
                1000,
            )
            .unwrap();
        assert!(matches!(reply, CoportReply::Opened { .. }));

        let events = gate.audit_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CocallEvent::Invoked { .. }));
        assert!(matches!(events[1], CocallEvent::Completed { .. }));
    }

    #[test]
    fn test_gate_records_rejection() {
        let gate = CocallGate::new();
        let compartment = IpcCompartment::new();
        let caller = CompartmentId::new();

        let forged = CoportHandle::with_tag(
            HandleBounds::for_index(0),
            CoportType::Channel,
            0xF0F0,
            true,
        );
        let result = gate.execute(
            &compartment,
            caller,
            CoportRequest::Send {
                handle: forged,
                payload: b"x".to_vec(),
            },
            2000,
        );
        assert_eq!(result.err(), Some(IpcError::InvalidArgument));

        let events = gate.audit_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CocallEvent::Rejected { .. })));
    }

    #[test]
    fn test_gate_audit_counting() {
        let gate = CocallGate::new();
        let compartment = IpcCompartment::new();
        let caller = CompartmentId::new();

        for i in 0..3 {
            let _ = gate.execute(
                &compartment,
                caller,
                CoportRequest::Open {
                    name: format!("port-{}", i),
                    transport: CoportType::Carrier,
                },
                i as u64,
            );
        }

        let events = gate.audit_events();
        let invoked = events
            .iter()
            .filter(|e| matches!(e, CocallEvent::Invoked { .. }))
            .count();
        assert_eq!(invoked, 3);

        gate.clear_audit_log();
        assert!(gate.audit_events().is_empty());
    }
}
