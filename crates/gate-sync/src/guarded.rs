//! Gate-guarded shared value
//!
//! [`GuardedValue`] pairs a value with a private single-slot [`BoundedGate`].
//! The value can only be reached through a closure that runs while the slot
//! is held, so no reference to it can escape the critical section.

use std::cell::UnsafeCell;
use std::fmt;
use std::time::Duration;

use crate::gate::{BoundedGate, GatePermit};

/// A value that at most one caller may access at a time
///
/// # Example
///
/// ```rust
/// use gate_sync::GuardedValue;
///
/// let stock = GuardedValue::new(5_u32);
/// let sold = stock.with_exclusive_access(|units| {
///     if *units > 0 {
///         *units -= 1;
///         true
///     } else {
///         false
///     }
/// });
/// assert!(sold);
/// assert_eq!(stock.into_inner(), 4);
/// ```
pub struct GuardedValue<T> {
    /// Owned exclusively, never handed out
    gate: BoundedGate,
    value: UnsafeCell<T>,
}

// SAFETY: the value is only touched while the private gate's single slot is
// held, which serializes access across threads just like a mutex.
unsafe impl<T: Send> Send for GuardedValue<T> {}
unsafe impl<T: Send> Sync for GuardedValue<T> {}

impl<T> GuardedValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            gate: BoundedGate::mutex(),
            value: UnsafeCell::new(initial),
        }
    }

    /// Run `operation` with exclusive access to the value
    ///
    /// The slot is released on every exit path, including a panic inside
    /// `operation`, which is then propagated to the caller.
    pub fn with_exclusive_access<R>(&self, operation: impl FnOnce(&mut T) -> R) -> R {
        let permit = self.gate.acquire();
        self.run_held(&permit, operation)
    }

    /// Like [`with_exclusive_access`](Self::with_exclusive_access), but gives
    /// up after `timeout`
    ///
    /// Returns `None` without running `operation` if the slot could not be
    /// taken in time.
    pub fn try_with_exclusive_access_for<R>(
        &self,
        timeout: Duration,
        operation: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let permit = self.gate.try_acquire_for(timeout).into_permit()?;
        Some(self.run_held(&permit, operation))
    }

    /// Mutable access without taking the gate; the borrow proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    fn run_held<R>(&self, _permit: &GatePermit, operation: impl FnOnce(&mut T) -> R) -> R {
        // SAFETY: `_permit` holds the only slot of `self.gate`, so no other
        // reference to the value exists for the duration of this call, and the
        // closure signature keeps the borrow from outliving it.
        let value = unsafe { &mut *self.value.get() };
        operation(value)
    }
}

impl<T: Default> Default for GuardedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for GuardedValue<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GuardedValue");
        // Never block inside Debug
        match self.gate.try_acquire() {
            Some(permit) => {
                self.run_held(&permit, |value| {
                    d.field("value", &*value);
                });
            }
            None => {
                d.field("value", &format_args!("<held>"));
            }
        }
        d.finish()
    }
}
