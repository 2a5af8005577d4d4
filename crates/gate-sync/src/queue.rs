//! FIFO queue guarded by a single-slot gate

use std::collections::VecDeque;
use std::fmt;

use crate::guarded::GuardedValue;

/// A first-in first-out queue shared between producers and consumers
///
/// Every operation runs inside one critical section of the queue's private
/// gate, so callers never observe a half-applied enqueue or dequeue. The queue
/// itself is unbounded: producers only ever wait for the critical section,
/// never for room.
///
/// # Example
///
/// ```rust
/// use gate_sync::GuardedQueue;
///
/// let queue = GuardedQueue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.try_dequeue(), Some(1));
/// assert_eq!(queue.drain(), vec![2]);
/// assert_eq!(queue.try_dequeue(), None);
/// ```
pub struct GuardedQueue<T> {
    items: GuardedValue<VecDeque<T>>,
}

impl<T> GuardedQueue<T> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: GuardedValue::new(VecDeque::new()),
        }
    }

    /// Append `item` at the tail
    pub fn enqueue(&self, item: T) {
        self.items.with_exclusive_access(|items| items.push_back(item));
    }

    /// Remove and return the head, or `None` if the queue is empty
    #[must_use]
    pub fn try_dequeue(&self) -> Option<T> {
        self.items.with_exclusive_access(VecDeque::pop_front)
    }

    /// Remove every queued item, oldest first, in one critical section
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        self.items
            .with_exclusive_access(|items| items.drain(..).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.with_exclusive_access(|items| items.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> VecDeque<T> {
        self.items.into_inner()
    }
}

impl<T> Default for GuardedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for GuardedQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: GuardedValue::new(iter.into_iter().collect()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedQueue")
            .field("items", &self.items)
            .finish()
    }
}
