//! Atomic cells backing the coport record
//!
//! The status field is the serialization point for every operation on a
//! coport: all transitions are compare-and-swap, and a failed CAS is retried
//! by re-reading, never by falling back to a lock.

use coport_types::EventMask;
use std::sync::atomic::{AtomicU8, Ordering};

/// Coport state machine states
///
/// `Open → Busy` is the universal entry for channel and carrier operations.
/// Pipe uses the richer `Open → Busy → Ready → Busy → Done → Open` cycle.
/// `Closing`/`Closed` short-circuit every operation with `BrokenPipe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoportStatus {
    /// Idle, no operation in flight
    Open = 0,
    /// Exactly one operation in flight
    Busy = 1,
    /// Pipe only: receiver has published a destination buffer
    Ready = 2,
    /// Pipe only: sender has completed the copy
    Done = 3,
    /// Close in progress
    Closing = 4,
    /// Terminal
    Closed = 5,
}

impl CoportStatus {
    fn from_u8(raw: u8) -> CoportStatus {
        match raw {
            0 => CoportStatus::Open,
            1 => CoportStatus::Busy,
            2 => CoportStatus::Ready,
            3 => CoportStatus::Done,
            4 => CoportStatus::Closing,
            _ => CoportStatus::Closed,
        }
    }

    /// Returns whether the endpoint is closing or closed
    pub fn is_shutdown(&self) -> bool {
        matches!(self, CoportStatus::Closing | CoportStatus::Closed)
    }
}

/// Atomic wrapper for [`CoportStatus`]
///
/// Acquire loads pair with Release stores so that buffer contents written
/// under `Busy` are visible before the next holder reads indices or length.
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub fn new(status: CoportStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn load(&self) -> CoportStatus {
        CoportStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, status: CoportStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Single CAS attempt; the caller decides whether to re-read and retry
    pub fn compare_exchange(
        &self,
        current: CoportStatus,
        new: CoportStatus,
    ) -> Result<CoportStatus, CoportStatus> {
        self.0
            .compare_exchange(
                current as u8,
                new as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(CoportStatus::from_u8)
            .map_err(CoportStatus::from_u8)
    }
}

/// Atomic wrapper for the readiness [`EventMask`]
#[derive(Debug)]
pub struct AtomicEventMask(AtomicU8);

impl AtomicEventMask {
    pub fn new(mask: EventMask) -> Self {
        Self(AtomicU8::new(mask.bits()))
    }

    pub fn load(&self) -> EventMask {
        EventMask::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Atomically sets the bits of `mask`
    pub fn insert(&self, mask: EventMask) {
        self.0.fetch_or(mask.bits(), Ordering::AcqRel);
    }

    /// Atomically clears the bits of `mask`
    pub fn remove(&self, mask: EventMask) {
        self.0.fetch_and(!mask.bits(), Ordering::AcqRel);
    }
}
