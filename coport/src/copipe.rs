//! Pipe transport: synchronous rendezvous
//!
//! One message in flight, no intermediate allocation: the receiver publishes
//! a destination buffer, the sender copies straight into it inside the exact
//! bounds published, and the receiver takes the bytes back out.
//!
//! Both sides wait by spinning with scheduler yields. The far side is
//! reached through a blocking call this process cannot interrupt, so a
//! condition variable would deadlock; the injectable [`Backoff`] policy is
//! the only knob. There is no automatic timeout in this layer.

use crate::backoff::Backoff;
use crate::record::{Coport, PipeDest, TransportState};
use crate::status::CoportStatus;
use coport_types::{CoportType, IpcError};

impl Coport {
    /// Receives one message into `buf`
    ///
    /// Publishes `buf.len()` as the destination bound, waits for a sender to
    /// complete the copy, and returns the byte count the sender recorded.
    /// With a bounded policy, gives up with `WouldBlock` (withdrawing the
    /// published buffer) if no sender arrives.
    pub fn pipe_recv(&self, buf: &mut [u8], backoff: &Backoff) -> Result<usize, IpcError> {
        if self.transport() != CoportType::Pipe {
            return Err(IpcError::InvalidArgument);
        }

        // Open -> Busy: serialize against other receivers.
        let mut guard = self.enter_busy(backoff)?;
        let published = match guard.state() {
            TransportState::Pipe(pipe) => {
                pipe.dest = Some(PipeDest {
                    data: vec![0; buf.len()],
                    len: 0,
                });
                true
            }
            _ => false,
        };
        if !published {
            guard.release(CoportStatus::Open);
            return Err(IpcError::InvalidArgument);
        }
        // Busy -> Ready: the destination is published.
        guard.release(CoportStatus::Ready);

        // Wait for the sender's Busy -> Done handoff.
        let mut attempt = 0;
        loop {
            match self.status.load() {
                CoportStatus::Done => break,
                status if status.is_shutdown() => return Err(IpcError::BrokenPipe),
                CoportStatus::Ready => {
                    if backoff.pause(&mut attempt) {
                        continue;
                    }
                    // Patience exhausted: withdraw the published buffer. If
                    // the CAS fails a sender just claimed it; see the copy
                    // through instead of abandoning it.
                    if self
                        .status
                        .compare_exchange(CoportStatus::Ready, CoportStatus::Busy)
                        .is_ok()
                    {
                        // Safety: we re-acquired Busy.
                        let state = unsafe { self.state_mut() };
                        if let TransportState::Pipe(pipe) = state {
                            pipe.dest = None;
                        }
                        let _ = self
                            .status
                            .compare_exchange(CoportStatus::Busy, CoportStatus::Open);
                        return Err(IpcError::WouldBlock);
                    }
                }
                // A sender holds Busy mid-copy; that window is short.
                _ => std::thread::yield_now(),
            }
        }

        // Safety: Done grants the receiver exclusive access; the sender's
        // Release store ordered its writes before our Acquire load.
        let state = unsafe { self.state_mut() };
        let taken = match state {
            TransportState::Pipe(pipe) => pipe.dest.take(),
            _ => None,
        };
        let result = match taken {
            Some(dest) => {
                buf[..dest.len].copy_from_slice(&dest.data[..dest.len]);
                Ok(dest.len)
            }
            None => Err(IpcError::InvalidArgument),
        };
        let _ = self
            .status
            .compare_exchange(CoportStatus::Done, CoportStatus::Open);
        result
    }

    /// Sends one message into the buffer a receiver published
    ///
    /// Spins until the coport is `Ready`, claims it, bounds-checks the
    /// published destination, and copies the message in. A destination too
    /// small for the message fails `MessageSize` and releases the coport
    /// back to `Ready` so the receiver's offer stays valid.
    pub fn pipe_send(&self, payload: &[u8], backoff: &Backoff) -> Result<usize, IpcError> {
        if self.transport() != CoportType::Pipe {
            return Err(IpcError::InvalidArgument);
        }

        let mut attempt = 0;
        loop {
            match self.status.load() {
                status if status.is_shutdown() => return Err(IpcError::BrokenPipe),
                CoportStatus::Ready => {
                    if self
                        .status
                        .compare_exchange(CoportStatus::Ready, CoportStatus::Busy)
                        .is_ok()
                    {
                        break;
                    }
                }
                _ => {
                    if !backoff.pause(&mut attempt) {
                        return Err(IpcError::WouldBlock);
                    }
                }
            }
        }

        // Safety: the Ready -> Busy CAS made this thread the exclusive holder.
        let state = unsafe { self.state_mut() };
        let dest = match state {
            TransportState::Pipe(pipe) => pipe.dest.as_mut(),
            _ => None,
        };
        let dest = match dest {
            Some(dest) => dest,
            None => {
                // No published destination despite Ready; hand the cycle back.
                let _ = self
                    .status
                    .compare_exchange(CoportStatus::Busy, CoportStatus::Open);
                return Err(IpcError::InvalidArgument);
            }
        };

        if dest.data.len() < payload.len() {
            // Too big for the published bounds; the offer stays standing.
            let _ = self
                .status
                .compare_exchange(CoportStatus::Busy, CoportStatus::Ready);
            return Err(IpcError::MessageSize);
        }

        dest.data[..payload.len()].copy_from_slice(payload);
        dest.len = payload.len();

        // Busy -> Done: Release-publishes the copy to the receiver.
        if self
            .status
            .compare_exchange(CoportStatus::Busy, CoportStatus::Done)
            .is_err()
        {
            return Err(IpcError::BrokenPipe);
        }
        Ok(payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_rendezvous_round_trip() {
        let port = Arc::new(Coport::pipe());

        let receiver = {
            let port = port.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 10];
                let n = port.pipe_recv(&mut buf, &Backoff::unbounded()).unwrap();
                (n, buf)
            })
        };

        let n = port.pipe_send(b"abcdefghij", &Backoff::unbounded()).unwrap();
        assert_eq!(n, 10);

        let (received, buf) = receiver.join().unwrap();
        assert_eq!(received, 10);
        assert_eq!(&buf, b"abcdefghij");
    }

    #[test]
    fn test_short_message_reports_exact_length() {
        let port = Arc::new(Coport::pipe());

        let receiver = {
            let port = port.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 32];
                let n = port.pipe_recv(&mut buf, &Backoff::unbounded()).unwrap();
                (n, buf)
            })
        };

        port.pipe_send(b"hi", &Backoff::unbounded()).unwrap();
        let (n, buf) = receiver.join().unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn test_oversized_send_leaves_offer_standing() {
        let port = Arc::new(Coport::pipe());

        let receiver = {
            let port = port.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                let n = port.pipe_recv(&mut buf, &Backoff::unbounded()).unwrap();
                (n, buf)
            })
        };

        // Wait until the receiver has published its 4-byte destination.
        while port.status() != CoportStatus::Ready {
            thread::yield_now();
        }

        assert_eq!(
            port.pipe_send(b"too large", &Backoff::unbounded()),
            Err(IpcError::MessageSize)
        );
        assert_eq!(port.status(), CoportStatus::Ready);

        // A fitting message still goes through the same offer.
        port.pipe_send(b"ok!", &Backoff::unbounded()).unwrap();
        let (n, buf) = receiver.join().unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"ok!");
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn test_send_without_receiver_gives_up_bounded() {
        let port = Coport::pipe();
        assert_eq!(
            port.pipe_send(b"x", &Backoff::bounded(64).with_spin_limit(4)),
            Err(IpcError::WouldBlock)
        );
        assert_eq!(port.status(), CoportStatus::Open);
    }

    #[test]
    fn test_recv_without_sender_withdraws_offer() {
        let port = Coport::pipe();
        let mut buf = [0u8; 8];
        assert_eq!(
            port.pipe_recv(&mut buf, &Backoff::bounded(64).with_spin_limit(4)),
            Err(IpcError::WouldBlock)
        );
        // The withdrawn offer leaves the port reusable.
        assert_eq!(port.status(), CoportStatus::Open);
    }

    #[test]
    fn test_closed_pipe_is_broken() {
        let port = Coport::pipe();
        port.close();
        let mut buf = [0u8; 4];
        assert_eq!(
            port.pipe_recv(&mut buf, &Backoff::unbounded()),
            Err(IpcError::BrokenPipe)
        );
        assert_eq!(
            port.pipe_send(b"x", &Backoff::unbounded()),
            Err(IpcError::BrokenPipe)
        );
    }

    #[test]
    fn test_close_unblocks_spinning_receiver() {
        let port = Arc::new(Coport::pipe());

        let receiver = {
            let port = port.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                port.pipe_recv(&mut buf, &Backoff::unbounded())
            })
        };

        while port.status() != CoportStatus::Ready {
            thread::yield_now();
        }
        port.close();
        assert_eq!(receiver.join().unwrap(), Err(IpcError::BrokenPipe));
    }

    #[test]
    fn test_second_send_waits_for_new_offer() {
        let port = Arc::new(Coport::pipe());

        let receiver = {
            let port = port.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                port.pipe_recv(&mut buf, &Backoff::unbounded()).unwrap()
            })
        };

        port.pipe_send(b"one", &Backoff::unbounded()).unwrap();
        receiver.join().unwrap();

        // No receiver has published a new buffer; a bounded sender spins out.
        assert_eq!(
            port.pipe_send(b"two", &Backoff::bounded(64).with_spin_limit(4)),
            Err(IpcError::WouldBlock)
        );
    }
}
