//! The coport record
//!
//! A [`Coport`] is shared-write state: its buffer and indices may be touched
//! only by the thread that currently owns the `Busy` status (or, for pipe,
//! the thread the protocol hands ownership to via `Ready`/`Done`). The
//! atomic status field is the sole serialization point; there is no lock on
//! this path.

use crate::arena::MsgRef;
use crate::backoff::Backoff;
use crate::poll::WaitQueue;
use crate::status::{AtomicEventMask, AtomicStatus, CoportStatus};
use coport_types::{CoportId, CoportType, EventMask, IpcError};
use std::cell::UnsafeCell;

/// Pipe destination published by a blocked receiver
#[derive(Debug)]
pub(crate) struct PipeDest {
    /// Receiver-owned buffer the sender copies into; its length is the
    /// exact bound the sender must respect
    pub data: Vec<u8>,
    /// Bytes the sender recorded
    pub len: usize,
}

#[derive(Debug, Default)]
pub(crate) struct PipeState {
    pub dest: Option<PipeDest>,
}

#[derive(Debug)]
pub(crate) struct ChannelState {
    pub buf: Vec<u8>,
    pub start: usize,
    pub end: usize,
    pub length: usize,
}

#[derive(Debug)]
pub(crate) struct CarrierState {
    pub slots: Vec<Option<MsgRef>>,
    pub start: usize,
    pub end: usize,
    pub length: usize,
}

/// Transport-specific interior state, guarded by the status protocol
#[derive(Debug)]
pub(crate) enum TransportState {
    Pipe(PipeState),
    Channel(ChannelState),
    Carrier(CarrierState),
}

/// An IPC endpoint
///
/// The record every transport operates on: immutable transport type, atomic
/// status and readiness mask, protocol-guarded interior state, and the
/// listener queue the poll subsystem registers into.
pub struct Coport {
    id: CoportId,
    transport: CoportType,
    pub(crate) status: AtomicStatus,
    events: AtomicEventMask,
    state: UnsafeCell<TransportState>,
    waiters: WaitQueue,
}

// The interior state is only reached while holding the Busy status (or the
// pipe Done handoff), which the atomic protocol makes exclusive.
unsafe impl Send for Coport {}
unsafe impl Sync for Coport {}

impl Coport {
    /// Creates a pipe coport
    pub fn pipe() -> Self {
        Self::new(
            CoportType::Pipe,
            TransportState::Pipe(PipeState::default()),
            EventMask::empty(),
        )
    }

    /// Creates a channel coport with a ring of `capacity` bytes
    pub fn channel(capacity: usize) -> Self {
        Self::new(
            CoportType::Channel,
            TransportState::Channel(ChannelState {
                buf: vec![0; capacity],
                start: 0,
                end: 0,
                length: 0,
            }),
            EventMask::OUT,
        )
    }

    /// Creates a carrier coport with `slots` message slots
    pub fn carrier(slots: usize) -> Self {
        Self::new(
            CoportType::Carrier,
            TransportState::Carrier(CarrierState {
                slots: vec![None; slots],
                start: 0,
                end: 0,
                length: 0,
            }),
            EventMask::OUT,
        )
    }

    fn new(transport: CoportType, state: TransportState, events: EventMask) -> Self {
        Self {
            id: CoportId::new(),
            transport,
            status: AtomicStatus::new(CoportStatus::Open),
            events: AtomicEventMask::new(events),
            state: UnsafeCell::new(state),
            waiters: WaitQueue::new(),
        }
    }

    /// Returns the endpoint identifier
    pub fn id(&self) -> CoportId {
        self.id
    }

    /// Returns the transport type
    pub fn transport(&self) -> CoportType {
        self.transport
    }

    /// Returns the current readiness mask
    pub fn events(&self) -> EventMask {
        self.events.load()
    }

    /// Returns the current status
    pub fn status(&self) -> CoportStatus {
        self.status.load()
    }

    pub(crate) fn waiters(&self) -> &WaitQueue {
        &self.waiters
    }

    /// Sets and clears readiness bits, then wakes intersecting listeners
    pub(crate) fn publish_events(&self, set: EventMask, clear: EventMask) {
        self.events.remove(clear);
        self.events.insert(set);
        self.waiters.notify(self.events.load());
    }

    /// Claims the coport for one operation via the `Open → Busy` CAS
    ///
    /// A failed CAS re-reads the status and retries; observing a transient
    /// `Busy` (or a pipe mid-cycle) is bounded internal recovery and stays
    /// invisible to the caller unless the backoff policy is exhausted.
    pub(crate) fn enter_busy(&self, backoff: &Backoff) -> Result<BusyGuard<'_>, IpcError> {
        let mut attempt = 0;
        loop {
            let observed = self.status.load();
            if observed.is_shutdown() {
                return Err(IpcError::BrokenPipe);
            }
            if observed == CoportStatus::Open
                && self
                    .status
                    .compare_exchange(CoportStatus::Open, CoportStatus::Busy)
                    .is_ok()
            {
                return Ok(BusyGuard {
                    port: self,
                    released: false,
                });
            }
            if !backoff.pause(&mut attempt) {
                return Err(IpcError::WouldBlock);
            }
        }
    }

    /// Grants interior access to the pipe protocol modules
    ///
    /// # Safety
    ///
    /// The caller must be the thread the status protocol currently grants
    /// exclusive access to: the holder of `Busy`, or the pipe receiver that
    /// has just observed `Done` (the sender's Release store has already
    /// synchronized the state).
    pub(crate) unsafe fn state_mut(&self) -> &mut TransportState {
        &mut *self.state.get()
    }

    /// Raises a fault readiness bit and wakes intersecting listeners
    ///
    /// Only the `RecvErr`/`SendErr` bits are accepted; occupancy bits stay
    /// under the exclusive control of the transport protocols.
    pub fn raise_error(&self, bits: EventMask) {
        let bits = bits & (EventMask::RECV_ERR | EventMask::SEND_ERR);
        if !bits.is_empty() {
            self.publish_events(bits, EventMask::empty());
        }
    }

    /// Marks the endpoint closed and wakes everything blocked on it
    ///
    /// Operations in flight observe `Closing`/`Closed` at their next status
    /// read and fail with `BrokenPipe`; their release CAS fails harmlessly
    /// against the shutdown state.
    pub fn close(&self) {
        loop {
            let observed = self.status.load();
            if observed.is_shutdown() {
                break;
            }
            if self
                .status
                .compare_exchange(observed, CoportStatus::Closing)
                .is_ok()
            {
                break;
            }
        }
        self.publish_events(EventMask::CLOSED, EventMask::empty());
        self.status.store(CoportStatus::Closed);
    }
}

/// Exclusive access token produced by the `Open → Busy` CAS
///
/// Dropping the guard (or releasing it explicitly) hands the coport back
/// with a CAS, so a concurrent close is never overwritten.
pub(crate) struct BusyGuard<'a> {
    port: &'a Coport,
    released: bool,
}

impl BusyGuard<'_> {
    pub fn state(&mut self) -> &mut TransportState {
        // Safety: this guard holds the Busy status.
        unsafe { self.port.state_mut() }
    }

    /// Releases the coport into `next`
    pub fn release(mut self, next: CoportStatus) {
        self.released = true;
        let _ = self
            .port
            .status
            .compare_exchange(CoportStatus::Busy, next);
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self
                .port
                .status
                .compare_exchange(CoportStatus::Busy, CoportStatus::Open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_channel_is_open_and_writable() {
        let port = Coport::channel(16);
        assert_eq!(port.status(), CoportStatus::Open);
        assert_eq!(port.transport(), CoportType::Channel);
        assert!(port.events().contains(EventMask::OUT));
        assert!(!port.events().contains(EventMask::IN));
    }

    #[test]
    fn test_enter_busy_claims_exclusively() {
        let port = Coport::channel(16);
        let guard = port.enter_busy(&Backoff::unbounded()).unwrap();
        assert_eq!(port.status(), CoportStatus::Busy);

        // A second claim with a bounded policy gives up.
        assert_eq!(
            port.enter_busy(&Backoff::bounded(4)).err(),
            Some(IpcError::WouldBlock)
        );

        guard.release(CoportStatus::Open);
        assert_eq!(port.status(), CoportStatus::Open);
    }

    #[test]
    fn test_guard_drop_restores_open() {
        let port = Coport::carrier(4);
        {
            let _guard = port.enter_busy(&Backoff::unbounded()).unwrap();
        }
        assert_eq!(port.status(), CoportStatus::Open);
    }

    #[test]
    fn test_close_is_terminal() {
        let port = Coport::channel(16);
        port.close();
        assert_eq!(port.status(), CoportStatus::Closed);
        assert!(port.events().contains(EventMask::CLOSED));
        assert_eq!(
            port.enter_busy(&Backoff::unbounded()).err(),
            Some(IpcError::BrokenPipe)
        );
    }

    #[test]
    fn test_release_loses_to_close() {
        let port = Coport::channel(16);
        let guard = port.enter_busy(&Backoff::unbounded()).unwrap();
        port.close();
        guard.release(CoportStatus::Open);
        // The close wins; the port does not reopen.
        assert_eq!(port.status(), CoportStatus::Closed);
    }
}
