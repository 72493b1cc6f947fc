//! Per-coport readiness bits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Readiness bitmask for a coport
///
/// `In` means a receive would currently make progress, `Out` means a send
/// would. `Closed` is terminal. `RecvErr`/`SendErr` report faults observed
/// by the far side of the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMask(u8);

impl EventMask {
    /// Endpoint has been closed
    pub const CLOSED: EventMask = EventMask(1);
    /// Data or messages are available to receive
    pub const IN: EventMask = EventMask(2);
    /// Capacity is available to send
    pub const OUT: EventMask = EventMask(4);
    /// A receive-side fault was recorded
    pub const RECV_ERR: EventMask = EventMask(8);
    /// A send-side fault was recorded
    pub const SEND_ERR: EventMask = EventMask(16);

    /// The empty mask
    pub const fn empty() -> Self {
        EventMask(0)
    }

    /// Creates a mask from raw bits, dropping unknown ones
    pub const fn from_bits(bits: u8) -> Self {
        EventMask(bits & 0b1_1111)
    }

    /// Returns the raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns whether no bit is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns whether every bit of `other` is set in `self`
    pub const fn contains(&self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any bit of `other` is set in `self`
    pub const fn intersects(&self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `self` with the bits of `other` added
    pub const fn with(&self, other: EventMask) -> Self {
        EventMask(self.0 | other.0)
    }

    /// Returns `self` with the bits of `other` removed
    pub const fn without(&self, other: EventMask) -> Self {
        EventMask(self.0 & !other.0)
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = EventMask;

    fn bitand(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 & rhs.0)
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            if self.contains(EventMask::CLOSED) { "C" } else { "-" },
            if self.contains(EventMask::IN) { "I" } else { "-" },
            if self.contains(EventMask::OUT) { "O" } else { "-" },
            if self.contains(EventMask::RECV_ERR) { "r" } else { "-" },
            if self.contains(EventMask::SEND_ERR) { "s" } else { "-" },
        )
    }
}
