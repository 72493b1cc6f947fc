//! Capability/handle layer for coport references
//!
//! This module implements the sealing discipline that makes a coport
//! reference safe to pass across compartment boundaries.
//!
//! ## Design Principles
//!
//! 1. **Unforgeable**: a sealed handle carries a tag issued by a per-transport
//!    authority whose key is random per boot and never exposed. A handle with
//!    a guessed tag fails to unseal.
//! 2. **Typed**: the transport type recorded in the handle must match the
//!    authority that seals or unseals it, and the coport it resolves to.
//! 3. **Bounds-checked**: a handle covers exactly one coport-sized region of
//!    the coport table. Truncated or out-of-region handles fail validation.
//! 4. **Fail closed**: validation is a pure function returning `Result`; a
//!    handle that does not validate is never dereferenced.
//!
//! ## Example
//!
//! ```
//! use coport_types::{CoportHandle, CoportType, HandleBounds, SealingAuthority};
//!
//! let authority = SealingAuthority::mint(CoportType::Channel);
//! let raw = CoportHandle::unsealed(HandleBounds::for_index(3), CoportType::Channel);
//! let sealed = authority.seal(raw).unwrap();
//! let unsealed = authority.unseal(&sealed).unwrap();
//! assert_eq!(unsealed.index(), 3);
//! ```

use crate::transport::CoportType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Logical size of one coport record in the coport table
///
/// Handle bounds are expressed in these units: a valid handle covers exactly
/// one record, and the table region spans `capacity * COPORT_RECORD_SIZE`.
pub const COPORT_RECORD_SIZE: usize = 64;

/// Address/length pair restricting a handle to one coport-sized region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleBounds {
    /// Offset of the referenced record within the coport table region
    pub base: usize,
    /// Length of the referenced region
    pub length: usize,
}

impl HandleBounds {
    /// Bounds covering exactly the record at `index`
    pub const fn for_index(index: usize) -> Self {
        Self {
            base: index * COPORT_RECORD_SIZE,
            length: COPORT_RECORD_SIZE,
        }
    }

    /// Returns the table index this region starts at
    pub const fn index(&self) -> usize {
        self.base / COPORT_RECORD_SIZE
    }
}

impl fmt::Display for HandleBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.base, self.base + self.length)
    }
}

/// Errors related to capability operations
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The handle is not sealed and cannot be unsealed or presented
    #[error("Handle is not sealed")]
    NotSealed,
    /// The seal tag does not match the authority for the declared type
    #[error("Seal tag does not match authority")]
    BadSeal,
    /// The handle's transport type does not match the authority or coport
    #[error("Transport type mismatch")]
    TypeMismatch,
    /// The handle's bounds are truncated, misaligned, or outside the table
    #[error("Handle bounds invalid")]
    BadBounds,
}

/// A reference to a coport, safe to copy across compartment boundaries
///
/// A sealed handle can be held and passed by any compartment, but only the
/// transport layer (which holds the sealing authorities) can unseal it into
/// a dereferenceable [`UnsealedRef`].
///
/// # Security Note
///
/// The constructor is public so that the coport table can mint handles and
/// so that tests can build tampered ones. Unforgeability rests on the seal
/// tag check, not on constructor privacy: a handle built outside the
/// authority carries no valid tag and fails to unseal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoportHandle {
    bounds: HandleBounds,
    transport: CoportType,
    tag: u64,
    sealed: bool,
}

impl CoportHandle {
    /// Creates an unsealed handle for a freshly allocated coport
    pub fn unsealed(bounds: HandleBounds, transport: CoportType) -> Self {
        Self {
            bounds,
            transport,
            tag: 0,
            sealed: false,
        }
    }

    /// Creates a handle with an explicit tag and seal state
    ///
    /// # Security Note
    ///
    /// This exists for tests that probe forgery rejection. A tag not issued
    /// by the live authority will fail [`SealingAuthority::unseal`].
    pub fn with_tag(bounds: HandleBounds, transport: CoportType, tag: u64, sealed: bool) -> Self {
        Self {
            bounds,
            transport,
            tag,
            sealed,
        }
    }

    /// Returns the bounds of the referenced region
    pub fn bounds(&self) -> HandleBounds {
        self.bounds
    }

    /// Returns the declared transport type
    pub fn transport(&self) -> CoportType {
        self.transport
    }

    /// Returns whether the handle is sealed
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the seal tag (zero when unsealed)
    pub fn tag(&self) -> u64 {
        self.tag
    }
}

impl fmt::Display for CoportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle<{}>({}, {})",
            self.transport,
            self.bounds,
            if self.sealed { "sealed" } else { "unsealed" }
        )
    }
}

/// A validated, unsealed coport reference
///
/// Produced only by [`SealingAuthority::unseal`] and scoped to a single
/// operation. Possession authorizes dereferencing the coport table at
/// `index`; it is deliberately not serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsealedRef {
    index: usize,
    transport: CoportType,
}

impl UnsealedRef {
    /// Returns the coport table index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the transport type the handle was sealed for
    pub fn transport(&self) -> CoportType {
        self.transport
    }
}

/// Per-transport sealing authority
///
/// One authority per transport type is minted when the IPC compartment
/// starts. The key is random and never serialized; compartments only ever
/// see the sealed handles it produces.
#[derive(Debug)]
pub struct SealingAuthority {
    transport: CoportType,
    key: u64,
}

impl SealingAuthority {
    /// Mints the authority for one transport type
    pub fn mint(transport: CoportType) -> Self {
        let (hi, lo) = Uuid::new_v4().as_u64_pair();
        // A zero key would collide with the unsealed tag.
        let key = (hi ^ lo) | 1;
        Self { transport, key }
    }

    /// Returns the transport type this authority seals for
    pub fn transport(&self) -> CoportType {
        self.transport
    }

    /// Seals a handle, making it safe to hand to other compartments
    ///
    /// Sealing an already-sealed handle is an idempotent no-op. Fails when
    /// the handle's type or bounds are inconsistent with this authority.
    pub fn seal(&self, handle: CoportHandle) -> Result<CoportHandle, CapabilityError> {
        if handle.sealed {
            return Ok(handle);
        }
        if handle.transport != self.transport {
            return Err(CapabilityError::TypeMismatch);
        }
        if handle.bounds.length < COPORT_RECORD_SIZE || handle.bounds.base % COPORT_RECORD_SIZE != 0
        {
            return Err(CapabilityError::BadBounds);
        }
        Ok(CoportHandle {
            bounds: handle.bounds,
            transport: handle.transport,
            tag: self.key,
            sealed: true,
        })
    }

    /// Unseals a handle into an operation-scoped reference
    ///
    /// Fails when the handle is unsealed, declares a different transport, or
    /// carries a tag this authority did not issue.
    pub fn unseal(&self, handle: &CoportHandle) -> Result<UnsealedRef, CapabilityError> {
        if !handle.sealed {
            return Err(CapabilityError::NotSealed);
        }
        if handle.transport != self.transport {
            return Err(CapabilityError::TypeMismatch);
        }
        if handle.tag != self.key {
            return Err(CapabilityError::BadSeal);
        }
        Ok(UnsealedRef {
            index: handle.bounds.index(),
            transport: handle.transport,
        })
    }
}

/// Validates a handle presented by a possibly-hostile caller
///
/// Checks, in order: the handle carries a tag, its region lies within the
/// table extent, its length covers a full record, and its base is record
/// aligned. This is a pure check; it performs no I/O and never produces a
/// partial object. A handle failing validation must not be dereferenced.
pub fn validate(handle: &CoportHandle, table_extent: usize) -> Result<(), CapabilityError> {
    if !handle.sealed || handle.tag == 0 {
        return Err(CapabilityError::NotSealed);
    }
    let bounds = handle.bounds;
    if bounds.length < COPORT_RECORD_SIZE {
        return Err(CapabilityError::BadBounds);
    }
    if bounds.base % COPORT_RECORD_SIZE != 0 {
        return Err(CapabilityError::BadBounds);
    }
    let end = bounds.base.checked_add(bounds.length).ok_or(CapabilityError::BadBounds)?;
    if end > table_extent {
        return Err(CapabilityError::BadBounds);
    }
    Ok(())
}

/// Capability lifecycle events for audit trails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityEvent {
    /// An authority was minted for a transport type
    Minted { transport: CoportType },
    /// A handle was sealed
    Sealed { transport: CoportType },
    /// A handle was unsealed for an operation
    Unsealed { transport: CoportType },
    /// A presented handle was rejected
    Rejected {
        transport: CoportType,
        reason: String,
    },
}

/// Audit log for capability operations
///
/// Chronological, queryable record of seal/unseal/reject events, used by
/// tests to verify that forged handles never reach a dereference.
#[derive(Debug, Clone, Default)]
pub struct CapabilityAuditLog {
    events: Vec<CapabilityEvent>,
}

impl CapabilityAuditLog {
    /// Creates a new empty audit log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Records a capability event
    pub fn record(&mut self, event: CapabilityEvent) {
        self.events.push(event);
    }

    /// Returns all recorded events
    pub fn events(&self) -> &[CapabilityEvent] {
        &self.events
    }

    /// Checks if any event matches the predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    /// Clears all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
