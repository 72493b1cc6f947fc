//! Channel transport: bounded byte ring
//!
//! A channel is a stream: message boundaries are not preserved, and peers
//! agree on framing out of band. Sends copy the whole message or fail before
//! touching the ring; there is no partial write.

use crate::backoff::Backoff;
use crate::record::{ChannelState, Coport, TransportState};
use crate::status::CoportStatus;
use coport_types::{CoportType, EventMask, IpcError};

impl Coport {
    /// Appends `payload` to the ring
    ///
    /// Fails `WouldBlock` when the spare capacity cannot hold the whole
    /// message, and `MessageSize` when the message exceeds the ring outright
    /// and so could never succeed.
    pub fn channel_send(&self, payload: &[u8]) -> Result<usize, IpcError> {
        if self.transport() != CoportType::Channel {
            return Err(IpcError::InvalidArgument);
        }
        if payload.is_empty() {
            return Ok(0);
        }

        let mut guard = self.enter_busy(&Backoff::unbounded())?;
        let result = match guard.state() {
            TransportState::Channel(chan) => copy_in(chan, payload),
            _ => Err(IpcError::InvalidArgument),
        };
        if result.is_ok() {
            let full = match guard.state() {
                TransportState::Channel(chan) => chan.length == chan.buf.len(),
                _ => false,
            };
            // Published while still Busy, so readiness never runs behind a
            // concurrent peer's update.
            let clear = if full { EventMask::OUT } else { EventMask::empty() };
            self.publish_events(EventMask::IN, clear);
        }
        guard.release(CoportStatus::Open);
        result
    }

    /// Consumes up to `buf.len()` bytes from the ring
    ///
    /// Fails `WouldBlock` when the ring is empty.
    pub fn channel_recv(&self, buf: &mut [u8]) -> Result<usize, IpcError> {
        if self.transport() != CoportType::Channel {
            return Err(IpcError::InvalidArgument);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut guard = self.enter_busy(&Backoff::unbounded())?;
        let result = match guard.state() {
            TransportState::Channel(chan) => copy_out(chan, buf),
            _ => Err(IpcError::InvalidArgument),
        };
        if result.is_ok() {
            let empty = match guard.state() {
                TransportState::Channel(chan) => chan.length == 0,
                _ => false,
            };
            let clear = if empty { EventMask::IN } else { EventMask::empty() };
            self.publish_events(EventMask::OUT, clear);
        }
        guard.release(CoportStatus::Open);
        result
    }
}

/// Copies `payload` into `[end, end + len)`, splitting once at the wrap point
fn copy_in(chan: &mut ChannelState, payload: &[u8]) -> Result<usize, IpcError> {
    let capacity = chan.buf.len();
    if payload.len() > capacity {
        return Err(IpcError::MessageSize);
    }
    if capacity - chan.length < payload.len() {
        return Err(IpcError::WouldBlock);
    }

    let first = payload.len().min(capacity - chan.end);
    chan.buf[chan.end..chan.end + first].copy_from_slice(&payload[..first]);
    let rest = payload.len() - first;
    if rest > 0 {
        chan.buf[..rest].copy_from_slice(&payload[first..]);
    }

    // Indices advance exactly once, by exactly the bytes copied.
    chan.end = (chan.end + payload.len()) % capacity;
    chan.length += payload.len();
    Ok(payload.len())
}

/// Copies from `[start, start + n)` into `buf`, splitting once at the wrap
fn copy_out(chan: &mut ChannelState, buf: &mut [u8]) -> Result<usize, IpcError> {
    if chan.length == 0 {
        return Err(IpcError::WouldBlock);
    }
    let capacity = chan.buf.len();
    let n = buf.len().min(chan.length);

    let first = n.min(capacity - chan.start);
    buf[..first].copy_from_slice(&chan.buf[chan.start..chan.start + first]);
    let rest = n - first;
    if rest > 0 {
        buf[first..n].copy_from_slice(&chan.buf[..rest]);
    }

    chan.start = (chan.start + n) % capacity;
    chan.length -= n;
    Ok(n)
}
