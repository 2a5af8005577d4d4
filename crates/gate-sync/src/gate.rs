//! Bounded admission gate
//!
//! A [`BoundedGate`] admits at most `capacity` holders at a time. Callers that
//! arrive while every slot is taken block until a slot is released, or until
//! their deadline passes when they use one of the timed variants.
//!
//! # Example
//!
//! ```rust
//! use gate_sync::BoundedGate;
//! use std::time::Duration;
//!
//! # fn example() -> gate_sync::Result<()> {
//! // Two printers shared by every worker
//! let printers = BoundedGate::new(2)?;
//!
//! let first = printers.acquire();
//! let second = printers.acquire();
//! assert_eq!(printers.available(), 0);
//!
//! // Saturated: a zero timeout gives up immediately
//! assert!(printers.try_acquire_for(Duration::ZERO).is_timed_out());
//!
//! // Slots are released when permits drop
//! drop(first);
//! second.release();
//! assert_eq!(printers.available(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

use crate::error::{GateError, Result};

/// A cloneable counting gate that bounds the number of concurrent holders
///
/// # Design
///
/// - **Single lock**: the free-slot counter and the wait queue live behind one mutex
/// - **FIFO waiters**: each blocked caller takes a ticket; only the ticket at the
///   head of the queue may take a freed slot, so nobody starves
/// - **No barging**: a newcomer only takes the fast path when nobody is queued
/// - **RAII permits**: [`GatePermit`] releases its slot on drop
/// - **Cloneable**: clones share the same slots, so a gate can be handed to
///   every component that uses the resource
#[derive(Clone)]
pub struct BoundedGate {
    /// Shared state between all clones of this gate
    inner: Arc<GateInner>,
}

struct GateInner {
    /// Fixed at construction
    capacity: usize,
    state: Mutex<GateState>,
    /// Signalled whenever the head of the queue may be able to proceed
    admitted: Condvar,
}

struct GateState {
    /// Free slots, always in `0..=capacity`
    available: usize,
    /// Tickets of blocked callers in arrival order
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl GateState {
    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.queue.push_back(ticket);
        ticket
    }

    fn can_admit(&self, ticket: u64) -> bool {
        self.available > 0 && self.queue.front() == Some(&ticket)
    }

    /// Take a slot for the ticket at the head of the queue.
    ///
    /// Returns true when another queued caller can also proceed right away.
    fn admit_head(&mut self) -> bool {
        self.queue.pop_front();
        self.available -= 1;
        self.available > 0 && !self.queue.is_empty()
    }

    /// Drop a ticket whose deadline passed.
    ///
    /// Returns true when its departure unblocked the new head.
    fn abandon(&mut self, ticket: u64) -> bool {
        let was_head = self.queue.front() == Some(&ticket);
        if let Some(pos) = self.queue.iter().position(|t| *t == ticket) {
            self.queue.remove(pos);
        }
        was_head && self.available > 0 && !self.queue.is_empty()
    }
}

/// Result of a timed acquisition attempt
#[must_use = "a granted permit is released as soon as the outcome is dropped"]
#[derive(Debug)]
pub enum AcquireOutcome {
    /// The caller now holds a slot until the permit is dropped
    Granted(GatePermit),
    /// The deadline passed first; the caller holds nothing
    TimedOut,
}

impl AcquireOutcome {
    /// Whether a slot was granted
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Whether the attempt timed out
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Convert into the granted permit, if any
    #[must_use]
    pub fn into_permit(self) -> Option<GatePermit> {
        match self {
            Self::Granted(permit) => Some(permit),
            Self::TimedOut => None,
        }
    }
}

impl BoundedGate {
    /// Create a new gate with `capacity` slots, all free
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidConfiguration`] if `capacity` is 0
    ///
    /// # Example
    ///
    /// ```rust
    /// use gate_sync::BoundedGate;
    ///
    /// let gate = BoundedGate::new(3).unwrap();
    /// assert_eq!(gate.capacity(), 3);
    /// assert!(BoundedGate::new(0).is_err());
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(Self::with_capacity)
            .ok_or(GateError::InvalidConfiguration { capacity })
    }

    /// Create a gate from a capacity that is already known to be positive
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            inner: Arc::new(GateInner {
                capacity,
                state: Mutex::new(GateState {
                    available: capacity,
                    queue: VecDeque::new(),
                    next_ticket: 0,
                }),
                admitted: Condvar::new(),
            }),
        }
    }

    /// A gate with a single slot, i.e. a mutex
    #[must_use]
    pub fn mutex() -> Self {
        Self::with_capacity(NonZeroUsize::MIN)
    }

    /// Acquire a slot, blocking the calling thread until one is free
    ///
    /// Waiters are admitted in arrival order.
    pub fn acquire(&self) -> GatePermit {
        let mut state = self.inner.state.lock();
        if let Some(permit) = self.try_fast_path(&mut state) {
            return permit;
        }

        let ticket = state.enqueue();
        trace!(ticket, "waiting for gate slot");
        while !state.can_admit(ticket) {
            self.inner.admitted.wait(&mut state);
        }
        self.grant_head(state, ticket)
    }

    /// Try to acquire a slot without waiting
    ///
    /// Returns `None` if every slot is taken or other callers are already
    /// queued ahead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gate_sync::BoundedGate;
    ///
    /// let gate = BoundedGate::mutex();
    /// let held = gate.try_acquire();
    /// assert!(held.is_some());
    /// assert!(gate.try_acquire().is_none());
    /// ```
    #[must_use]
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let mut state = self.inner.state.lock();
        self.try_fast_path(&mut state)
    }

    /// Acquire a slot, waiting at most `timeout`
    ///
    /// A zero timeout attempts once and never waits.
    pub fn try_acquire_for(&self, timeout: Duration) -> AcquireOutcome {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_acquire_until(deadline),
            // Too far in the future to represent: no effective deadline
            None => AcquireOutcome::Granted(self.acquire()),
        }
    }

    /// Acquire a slot, waiting until `deadline` at the latest
    pub fn try_acquire_until(&self, deadline: Instant) -> AcquireOutcome {
        let mut state = self.inner.state.lock();
        if let Some(permit) = self.try_fast_path(&mut state) {
            return AcquireOutcome::Granted(permit);
        }
        if Instant::now() >= deadline {
            trace!("gate saturated, not waiting");
            return AcquireOutcome::TimedOut;
        }

        let ticket = state.enqueue();
        trace!(ticket, "waiting for gate slot with deadline");
        loop {
            if state.can_admit(ticket) {
                return AcquireOutcome::Granted(self.grant_head(state, ticket));
            }
            if self
                .inner
                .admitted
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // A release may have raced with the timeout
                if state.can_admit(ticket) {
                    return AcquireOutcome::Granted(self.grant_head(state, ticket));
                }
                let unblocked = state.abandon(ticket);
                drop(state);
                if unblocked {
                    self.inner.admitted.notify_all();
                }
                trace!(ticket, "gate acquisition timed out");
                return AcquireOutcome::TimedOut;
            }
        }
    }

    /// Return one slot to the gate
    ///
    /// Only needed for slots detached with [`GatePermit::forget`]; ordinary
    /// permits release themselves on drop.
    ///
    /// # Panics
    ///
    /// Panics if every slot is already free, i.e. the release has no matching
    /// acquire.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gate_sync::BoundedGate;
    ///
    /// let gate = BoundedGate::new(2).unwrap();
    /// gate.acquire().forget();
    /// assert_eq!(gate.available(), 1);
    ///
    /// gate.release();
    /// assert_eq!(gate.available(), 2);
    /// ```
    pub fn release(&self) {
        let mut state = self.inner.state.lock();
        assert!(
            state.available < self.inner.capacity,
            "release without acquire: all {} slots of the gate are already free",
            self.inner.capacity
        );
        state.available += 1;
        let has_waiters = !state.queue.is_empty();
        drop(state);

        trace!("gate slot released");
        if has_waiters {
            // Only the head ticket can proceed, and a condvar cannot target it
            self.inner.admitted.notify_all();
        }
    }

    /// Total number of slots (fixed at construction)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of free slots
    ///
    /// This is useful for monitoring and tests but should not be used for
    /// making decisions (the value may change immediately after reading).
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.state.lock().available
    }

    /// Number of slots currently held (capacity - available)
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.capacity - self.available()
    }

    /// Number of callers currently blocked waiting for a slot
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    fn try_fast_path(&self, state: &mut GateState) -> Option<GatePermit> {
        if state.queue.is_empty() && state.available > 0 {
            state.available -= 1;
            trace!(available = state.available, "gate slot granted");
            Some(GatePermit::new(self.clone()))
        } else {
            None
        }
    }

    fn grant_head(&self, mut state: MutexGuard<'_, GateState>, ticket: u64) -> GatePermit {
        let cascade = state.admit_head();
        trace!(ticket, available = state.available, "gate slot granted");
        drop(state);
        if cascade {
            self.inner.admitted.notify_all();
        }
        GatePermit::new(self.clone())
    }
}

impl fmt::Debug for BoundedGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("BoundedGate")
            .field("capacity", &self.inner.capacity)
            .field("available", &state.available)
            .field("waiting", &state.queue.len())
            .finish()
    }
}

/// RAII guard for one slot of a [`BoundedGate`]
///
/// Returned by the acquire methods. Dropping it releases the slot and wakes
/// the next waiter, on every exit path including unwinding.
#[must_use = "dropping a permit releases its slot immediately"]
pub struct GatePermit {
    /// The gate that issued this permit
    gate: BoundedGate,
    /// Cleared by `forget` so that drop leaves the slot taken
    armed: bool,
}

impl GatePermit {
    fn new(gate: BoundedGate) -> Self {
        Self { gate, armed: true }
    }

    /// Release the slot now (same as dropping the permit)
    pub fn release(self) {
        drop(self);
    }

    /// Keep the slot taken without holding a permit
    ///
    /// The caller becomes responsible for exactly one later
    /// [`BoundedGate::release`].
    pub fn forget(mut self) {
        self.armed = false;
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release();
        }
    }
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePermit")
            .field("capacity", &self.gate.capacity())
            .field("armed", &self.armed)
            .finish()
    }
}
