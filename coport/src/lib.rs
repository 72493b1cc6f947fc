//! # Coport
//!
//! This crate implements the coport endpoint: the record, its atomic state
//! machine, the three message transports, and the event/poll subsystem.
//!
//! ## Philosophy
//!
//! - **One write path**: the only way to touch a coport's buffer or indices
//!   is through the status CAS protocol. There is no lock to hold across a
//!   blocking call.
//! - **Never block on the hot path**: channel and carrier operations either
//!   complete or fail with `WouldBlock`; only `copoll` truly waits.
//! - **References, not pointers**: carrier messages live in a
//!   generation-tagged arena, so a stale reference is an error, never silent
//!   corruption.
//!
//! ## Architecture
//!
//! [`Coport`] is the shared record. The transports ([`Coport::pipe_send`],
//! [`Coport::channel_send`], [`Coport::carrier_send`] and their receive
//! duals) serialize on the atomic status field. Readiness changes feed the
//! per-coport [`WaitQueue`], which [`copoll`] blocks on.

pub mod arena;
pub mod backoff;
pub mod cocarrier;
pub mod cochannel;
pub mod copipe;
pub mod poll;
pub mod record;
pub mod status;
pub mod table;

pub use arena::{CarrierMessage, MsgArena, MsgRef};
pub use backoff::Backoff;
pub use poll::{copoll, PollEntry, Timeout, WaitQueue};
pub use record::Coport;
pub use status::CoportStatus;
pub use table::{CoportConfig, CoportTable};
