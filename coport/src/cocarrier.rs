//! Carrier transport: ring of read-only message references
//!
//! A carrier moves discrete messages by reference: the sender allocates the
//! payload in the arena, loses write access at install time, and the
//! receiver reads in place and frees explicitly when done. The ring itself
//! only ever holds read-only [`MsgRef`]s.
//!
//! A send on a full ring fails `WouldBlock` without mutating ring state and
//! without reclaiming anything: explicit free is the contract receivers rely
//! on for in-place reads, so the transport never auto-frees behind them.

use crate::arena::{MsgArena, MsgRef};
use crate::backoff::Backoff;
use crate::record::{Coport, TransportState};
use crate::status::CoportStatus;
use coport_types::{CoportHandle, CoportType, EventMask, IpcError};

impl Coport {
    /// Allocates, installs, and announces one message
    ///
    /// Returns the payload length on success. On a full ring the transient
    /// allocation is rolled back and the caller observes `WouldBlock`.
    pub fn carrier_send(
        &self,
        arena: &MsgArena,
        payload: &[u8],
        attachments: Vec<CoportHandle>,
    ) -> Result<usize, IpcError> {
        if self.transport() != CoportType::Carrier {
            return Err(IpcError::InvalidArgument);
        }

        let writable = arena.alloc(payload, attachments)?;
        let installed = arena.strip_write(writable)?;

        let mut guard = match self.enter_busy(&Backoff::unbounded()) {
            Ok(guard) => guard,
            Err(err) => {
                arena.discard(writable)?;
                return Err(err);
            }
        };
        let (result, full) = match guard.state() {
            TransportState::Carrier(car) => {
                if car.length == car.slots.len() {
                    (Err(IpcError::WouldBlock), true)
                } else {
                    car.slots[car.end] = Some(installed);
                    car.end = (car.end + 1) % car.slots.len();
                    car.length += 1;
                    (Ok(payload.len()), car.length == car.slots.len())
                }
            }
            _ => (Err(IpcError::InvalidArgument), false),
        };
        let mut sent = Ok(());
        if result.is_ok() {
            // Both happen while still Busy: the message cannot be received
            // before its sent flag flips, and readiness never runs behind a
            // concurrent peer's update.
            sent = arena.mark_sent(installed);
            let clear = if full { EventMask::OUT } else { EventMask::empty() };
            self.publish_events(EventMask::IN, clear);
        }
        guard.release(CoportStatus::Open);

        match result {
            Ok(n) => {
                sent?;
                Ok(n)
            }
            Err(err) => {
                arena.discard(writable)?;
                Err(err)
            }
        }
    }

    /// Takes the oldest message off the ring
    ///
    /// Returns the read-only reference together with the out-of-band
    /// attachment list, and marks the message received. The caller must
    /// later release it through [`Coport::carrier_free`].
    pub fn carrier_recv(
        &self,
        arena: &MsgArena,
    ) -> Result<(MsgRef, Vec<CoportHandle>), IpcError> {
        if self.transport() != CoportType::Carrier {
            return Err(IpcError::InvalidArgument);
        }

        let mut guard = self.enter_busy(&Backoff::unbounded())?;
        let (result, empty) = match guard.state() {
            TransportState::Carrier(car) => {
                if car.length == 0 {
                    (Err(IpcError::WouldBlock), true)
                } else {
                    let taken = car.slots[car.start].take().ok_or(IpcError::InvalidArgument);
                    car.start = (car.start + 1) % car.slots.len();
                    car.length -= 1;
                    (taken, car.length == 0)
                }
            }
            _ => (Err(IpcError::InvalidArgument), false),
        };
        if result.is_ok() {
            let clear = if empty { EventMask::IN } else { EventMask::empty() };
            self.publish_events(EventMask::OUT, clear);
        }
        guard.release(CoportStatus::Open);

        let msg = result?;
        arena.mark_received(msg)?;
        let attachments = arena.read(msg)?.attachments().to_vec();
        Ok((msg, attachments))
    }

    /// Releases a received message back to the arena
    ///
    /// Fails `InvalidArgument` when the reference matches no outstanding
    /// message or the message was already freed.
    pub fn carrier_free(&self, arena: &MsgArena, msg: MsgRef) -> Result<(), IpcError> {
        if self.transport() != CoportType::Carrier {
            return Err(IpcError::InvalidArgument);
        }
        arena.free(msg)
    }
}
