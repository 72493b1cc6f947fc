//! Generation-tagged arena for carrier messages
//!
//! Carrier payloads are independently allocated buffers handed to receivers
//! by reference. The arena models those buffers as fixed slots addressed by
//! [`MsgRef`], a generation-tagged index: once a slot is released its
//! generation advances, so a stale reference fails with `InvalidArgument`
//! instead of aliasing a recycled message.
//!
//! Write access is a property of the reference, not of the holder: the
//! sender's reference is stripped to read-only at install time, and every
//! mutation path checks the flag.

use coport_types::{CoportHandle, IpcError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Reference to a message slot in the arena
///
/// Serializable so it can cross the cocall boundary; the generation check
/// makes a tampered or stale reference harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRef {
    index: u32,
    generation: u32,
    writable: bool,
}

impl MsgRef {
    /// Returns the slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation this reference was issued for
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns whether this reference still permits mutation
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// A carrier message: payload, out-of-band attachments, lifecycle flags
///
/// The payload is immutable once any second reference to the message
/// exists. `sent`, `received`, and `freed` advance monotonically, each by a
/// single compare-and-swap.
#[derive(Debug)]
pub struct CarrierMessage {
    payload: Box<[u8]>,
    attachments: Vec<CoportHandle>,
    sent: AtomicBool,
    received: AtomicBool,
    freed: AtomicBool,
}

impl CarrierMessage {
    fn new(payload: &[u8], attachments: Vec<CoportHandle>) -> Self {
        Self {
            payload: payload.into(),
            attachments,
            sent: AtomicBool::new(false),
            received: AtomicBool::new(false),
            freed: AtomicBool::new(false),
        }
    }

    /// Returns the message payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the out-of-band attachment list
    pub fn attachments(&self) -> &[CoportHandle] {
        &self.attachments
    }

    /// Returns whether the message has been installed into a carrier
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Returns whether a receiver has taken the message
    pub fn is_received(&self) -> bool {
        self.received.load(Ordering::Acquire)
    }

    /// Returns whether the message has been freed
    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    fn flip(flag: &AtomicBool) -> bool {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl PartialEq for CarrierMessage {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
            && self.attachments == other.attachments
            && self.sent.load(Ordering::Acquire) == other.sent.load(Ordering::Acquire)
            && self.received.load(Ordering::Acquire) == other.received.load(Ordering::Acquire)
            && self.freed.load(Ordering::Acquire) == other.freed.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct ArenaSlot {
    generation: u32,
    message: Option<Arc<CarrierMessage>>,
}

#[derive(Debug)]
struct ArenaInner {
    slots: Vec<ArenaSlot>,
    free: Vec<usize>,
}

impl ArenaInner {
    /// Resolves a reference to its live slot, enforcing the generation tag
    fn slot(&mut self, msg: MsgRef) -> Result<&mut ArenaSlot, IpcError> {
        let slot = self
            .slots
            .get_mut(msg.index as usize)
            .ok_or(IpcError::InvalidArgument)?;
        if slot.generation != msg.generation || slot.message.is_none() {
            return Err(IpcError::InvalidArgument);
        }
        Ok(slot)
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.message = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
    }
}

/// Fixed-capacity message arena
#[derive(Debug)]
pub struct MsgArena {
    inner: Mutex<ArenaInner>,
}

impl MsgArena {
    /// Creates an arena with `capacity` message slots
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| ArenaSlot {
                generation: 0,
                message: None,
            })
            .collect();
        let free = (0..capacity).rev().collect();
        Self {
            inner: Mutex::new(ArenaInner { slots, free }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ArenaInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates an independent buffer and copies the payload in
    ///
    /// The returned reference is writable; the sender must strip it before
    /// installing the message into a carrier.
    pub fn alloc(
        &self,
        payload: &[u8],
        attachments: Vec<CoportHandle>,
    ) -> Result<MsgRef, IpcError> {
        let mut inner = self.lock();
        let index = inner.free.pop().ok_or(IpcError::ResourceExhausted)?;
        let slot = &mut inner.slots[index];
        slot.message = Some(Arc::new(CarrierMessage::new(payload, attachments)));
        Ok(MsgRef {
            index: index as u32,
            generation: slot.generation,
            writable: true,
        })
    }

    /// Strips write permission from a reference
    ///
    /// The read-only result is what gets installed and what the receiver
    /// eventually sees; the sender keeps no mutable path to the bytes.
    pub fn strip_write(&self, msg: MsgRef) -> Result<MsgRef, IpcError> {
        let mut inner = self.lock();
        inner.slot(msg)?;
        Ok(MsgRef {
            writable: false,
            ..msg
        })
    }

    /// Rewrites the payload through a still-writable reference
    ///
    /// Fails once the message is installed, shared with a reader, or the
    /// replacement differs in length.
    pub fn overwrite(&self, msg: MsgRef, payload: &[u8]) -> Result<(), IpcError> {
        if !msg.writable {
            return Err(IpcError::InvalidArgument);
        }
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        let message = slot.message.as_mut().ok_or(IpcError::InvalidArgument)?;
        if message.is_sent() {
            return Err(IpcError::InvalidArgument);
        }
        let message = Arc::get_mut(message).ok_or(IpcError::InvalidArgument)?;
        if message.payload.len() != payload.len() {
            return Err(IpcError::MessageSize);
        }
        message.payload.copy_from_slice(payload);
        Ok(())
    }

    /// Marks the message installed; succeeds at most once
    pub fn mark_sent(&self, msg: MsgRef) -> Result<(), IpcError> {
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        let message = slot.message.as_ref().ok_or(IpcError::InvalidArgument)?;
        if !CarrierMessage::flip(&message.sent) {
            return Err(IpcError::InvalidArgument);
        }
        Ok(())
    }

    /// Marks the message received; succeeds at most once
    pub fn mark_received(&self, msg: MsgRef) -> Result<(), IpcError> {
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        let message = slot.message.as_ref().ok_or(IpcError::InvalidArgument)?;
        if !CarrierMessage::flip(&message.received) {
            return Err(IpcError::InvalidArgument);
        }
        Ok(())
    }

    /// Returns a shared reference to the message for reading
    pub fn read(&self, msg: MsgRef) -> Result<Arc<CarrierMessage>, IpcError> {
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        slot.message.clone().ok_or(IpcError::InvalidArgument)
    }

    /// Frees a received message, exactly once
    ///
    /// The `freed` flag flips `false → true` by compare-and-swap; a second
    /// free, a reference that matches no outstanding message, or a message
    /// that was never received all fail with `InvalidArgument`.
    pub fn free(&self, msg: MsgRef) -> Result<(), IpcError> {
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        let message = slot.message.as_ref().ok_or(IpcError::InvalidArgument)?;
        if !message.is_received() {
            return Err(IpcError::InvalidArgument);
        }
        if !CarrierMessage::flip(&message.freed) {
            return Err(IpcError::InvalidArgument);
        }
        inner.release(msg.index as usize);
        Ok(())
    }

    /// Discards a message that was never installed (send rollback)
    pub fn discard(&self, msg: MsgRef) -> Result<(), IpcError> {
        let mut inner = self.lock();
        let slot = inner.slot(msg)?;
        let message = slot.message.as_ref().ok_or(IpcError::InvalidArgument)?;
        if message.is_sent() {
            return Err(IpcError::InvalidArgument);
        }
        inner.release(msg.index as usize);
        Ok(())
    }

    /// Returns the number of live messages
    pub fn outstanding(&self) -> usize {
        let inner = self.lock();
        inner.slots.len() - inner.free.len()
    }

    /// Returns the slot capacity
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }
}
