//! Event/poll subsystem
//!
//! Readiness is a per-coport bitmask; waiting for it is a two-step protocol:
//! check the mask, and if nothing is ready, register a listener and block on
//! a condition variable. The check and the registration happen atomically
//! under the queue lock, which closes the classic lost-wakeup window between
//! "nothing ready" and "listener installed".

use crate::record::Coport;
use crate::status::AtomicEventMask;
use coport_types::{EventMask, IpcError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Poll timeout
///
/// An enum rather than a signed sentinel: the reference convention of
/// "negative means forever" cannot be passed by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    /// Non-blocking: report current readiness and return
    Poll,
    /// Block for at most this many milliseconds
    Millis(u64),
    /// Block until readiness changes
    Forever,
}

/// One coport of interest in a `copoll` call
#[derive(Clone)]
pub struct PollEntry {
    /// The endpoint to watch
    pub port: Arc<Coport>,
    /// Readiness bits the caller cares about
    pub interest: EventMask,
}

/// Wakeup signal shared by all listeners of one poll call
#[derive(Debug)]
pub(crate) struct PollSignal {
    woken: Mutex<bool>,
    cond: Condvar,
}

impl PollSignal {
    fn new() -> Self {
        Self {
            woken: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn wake(&self) {
        let mut woken = self.woken.lock().unwrap_or_else(PoisonError::into_inner);
        *woken = true;
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Timeout) {
        let mut woken = self.woken.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout {
            Timeout::Poll => {}
            Timeout::Forever => {
                while !*woken {
                    woken = self
                        .cond
                        .wait(woken)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Timeout::Millis(ms) => {
                let deadline = Instant::now() + Duration::from_millis(ms);
                while !*woken {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, result) = self
                        .cond
                        .wait_timeout(woken, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    woken = guard;
                    if result.timed_out() {
                        break;
                    }
                }
            }
        }
    }
}

/// A transient wait registration
///
/// Lives only for the duration of one `copoll` call: linked into the
/// coport's queue, filled in by notifications, removed before return.
#[derive(Debug)]
pub struct Listener {
    interest: EventMask,
    observed: AtomicEventMask,
    signal: Arc<PollSignal>,
}

impl Listener {
    /// Returns the events observed so far, masked by interest
    pub fn observed(&self) -> EventMask {
        self.observed.load()
    }
}

/// Per-coport listener queue
///
/// `register` checks current readiness and installs the listener under one
/// lock; `notify` walks the queue under the same lock. A readiness change
/// therefore either pre-fills the listener at registration or reaches it
/// through `notify` — it cannot fall between.
#[derive(Debug, Default)]
pub struct WaitQueue {
    listeners: Mutex<Vec<Arc<Listener>>>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Listener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a listener, pre-filling it if interest is already satisfied
    ///
    /// `current` is evaluated under the queue lock: a readiness change
    /// published before this registration is seen here, and one published
    /// after it reaches the listener through `notify`. Nothing falls
    /// between.
    fn register(
        &self,
        interest: EventMask,
        signal: Arc<PollSignal>,
        current: impl FnOnce() -> EventMask,
    ) -> Arc<Listener> {
        let mut listeners = self.lock();
        let listener = Arc::new(Listener {
            interest,
            observed: AtomicEventMask::new(EventMask::empty()),
            signal,
        });
        let ready = current() & interest;
        if !ready.is_empty() {
            listener.observed.insert(ready);
            listener.signal.wake();
        }
        listeners.push(listener.clone());
        listener
    }

    /// Wakes every listener whose interest intersects `events`
    pub(crate) fn notify(&self, events: EventMask) {
        let listeners = self.lock();
        for listener in listeners.iter() {
            let hit = events & listener.interest;
            if !hit.is_empty() {
                listener.observed.insert(hit);
                listener.signal.wake();
            }
        }
    }

    fn deregister(&self, listener: &Arc<Listener>) {
        let mut listeners = self.lock();
        listeners.retain(|other| !Arc::ptr_eq(other, listener));
    }

    /// Returns the number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Blocks until any watched coport satisfies its interest mask
///
/// With `Timeout::Poll` (or when some entry is ready at entry) this is the
/// non-blocking fast path: the observed masks are returned immediately and
/// no listener is registered. Otherwise one listener per coport is
/// registered, the shared signal is awaited, and every listener is
/// deregistered before the observed masks are returned.
pub fn copoll(entries: &[PollEntry], timeout: Timeout) -> Result<Vec<EventMask>, IpcError> {
    if entries.is_empty() {
        return Err(IpcError::InvalidArgument);
    }

    let observed: Vec<EventMask> = entries
        .iter()
        .map(|entry| entry.port.events() & entry.interest)
        .collect();
    if timeout == Timeout::Poll || observed.iter().any(|mask| !mask.is_empty()) {
        return Ok(observed);
    }

    let signal = Arc::new(PollSignal::new());
    let listeners: Vec<Arc<Listener>> = entries
        .iter()
        .map(|entry| {
            entry
                .port
                .waiters()
                .register(entry.interest, signal.clone(), || entry.port.events())
        })
        .collect();

    signal.wait(timeout);

    let observed = listeners.iter().map(|listener| listener.observed()).collect();
    for (entry, listener) in entries.iter().zip(listeners.iter()) {
        entry.port.waiters().deregister(listener);
    }
    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_entry_list_rejected() {
        assert_eq!(copoll(&[], Timeout::Poll), Err(IpcError::InvalidArgument));
    }

    #[test]
    fn test_nonblocking_poll_reports_current_readiness() {
        let port = Arc::new(Coport::channel(8));
        let entries = [PollEntry {
            port: port.clone(),
            interest: EventMask::IN | EventMask::OUT,
        }];

        let observed = copoll(&entries, Timeout::Poll).unwrap();
        assert_eq!(observed[0], EventMask::OUT);
    }

    #[test]
    fn test_timed_poll_expires_empty() {
        let port = Arc::new(Coport::channel(8));
        let entries = [PollEntry {
            port: port.clone(),
            interest: EventMask::IN,
        }];

        let observed = copoll(&entries, Timeout::Millis(10)).unwrap();
        assert!(observed[0].is_empty());
        assert!(port.waiters().is_empty());
    }

    #[test]
    fn test_notify_wakes_blocked_poll() {
        let port = Arc::new(Coport::channel(8));
        let entries = [PollEntry {
            port: port.clone(),
            interest: EventMask::IN,
        }];

        let waker = {
            let port = port.clone();
            thread::spawn(move || {
                // Give the poller time to register, then publish readiness.
                thread::sleep(Duration::from_millis(20));
                port.publish_events(EventMask::IN, EventMask::empty());
            })
        };

        let observed = copoll(&entries, Timeout::Forever).unwrap();
        assert_eq!(observed[0], EventMask::IN);
        waker.join().unwrap();
        assert!(port.waiters().is_empty());
    }

    #[test]
    fn test_registration_prefills_when_already_ready() {
        // Readiness published between the fast-path check and registration
        // must pre-fill the listener so the wait returns immediately.
        let queue = WaitQueue::new();
        let signal = Arc::new(PollSignal::new());
        let listener = queue.register(EventMask::IN, signal.clone(), || EventMask::IN);

        signal.wait(Timeout::Forever);
        assert_eq!(listener.observed(), EventMask::IN);
        queue.deregister(&listener);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_listener_only_sees_interest_bits() {
        let port = Arc::new(Coport::channel(8));
        let entries = [PollEntry {
            port: port.clone(),
            interest: EventMask::IN,
        }];

        let waker = {
            let port = port.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                port.publish_events(EventMask::IN | EventMask::SEND_ERR, EventMask::empty());
            })
        };

        let observed = copoll(&entries, Timeout::Forever).unwrap();
        assert_eq!(observed[0], EventMask::IN);
        waker.join().unwrap();
    }
}
