//! Bounded Queue: Blocking FIFO with a capacity that can change at runtime.
//!
//! The normal-priority lane of the executor needs backpressure on upstream
//! callers and a capacity that can be tuned after construction, which a
//! fixed-size channel cannot offer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Queue contents guarded by the mutex.
struct QueueState<T> {
    /// Pending items, oldest first.
    items: VecDeque<T>,
    /// Maximum number of items a blocking push will allow.
    capacity: usize,
    /// Set once by `close()`. No push succeeds afterwards.
    closed: bool,
}

/// A blocking FIFO queue with an adjustable capacity.
pub(crate) struct BoundedQueue<T> {
    /// Items and capacity.
    state: Mutex<QueueState<T>>,
    /// Signalled when an item is pushed.
    not_empty: Condvar,
    /// Signalled when an item is popped or capacity grows.
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                capacity: capacity.max(1),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Lock the state. Nothing panics while holding the lock, so a poisoned
    /// mutex still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an item, blocking while the queue is at capacity.
    ///
    /// Hands the item back if the queue is closed, including while blocked.
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        while !state.closed && state.items.len() >= state.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push an item regardless of capacity. Fails only once closed.
    pub(crate) fn force_push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Pop the oldest item if one is available.
    #[cfg(test)]
    pub(crate) fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove every pending item.
    ///
    /// Items are returned rather than dropped so the caller can release them
    /// outside the lock.
    pub(crate) fn drain(&self) -> Vec<T> {
        let items: Vec<T> = self.lock().items.drain(..).collect();
        self.not_full.notify_all();
        items
    }

    /// Reject further pushes and wake every blocked thread.
    ///
    /// Items already queued stay poppable.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Change the capacity. Blocked pushers re-check immediately.
    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.lock().capacity = capacity.max(1);
        self.not_full.notify_all();
    }

    /// Current capacity.
    pub(crate) fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Number of pending items.
    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_queue_fifo() {
        let queue = BoundedQueue::new(8);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.push(3).unwrap();
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_queue_zero_capacity_clamped() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_queue_force_push_ignores_capacity() {
        let queue = BoundedQueue::new(1);
        queue.push(1).unwrap();
        queue.force_push(2).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_push_blocks_until_pop() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop(), Some(1));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn test_queue_capacity_growth_unblocks() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        queue.set_capacity(4);
        producer.join().unwrap().unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_drain() {
        let queue = BoundedQueue::new(4);
        queue.push('a').unwrap();
        queue.push('b').unwrap();
        assert_eq!(queue.drain(), vec!['a', 'b']);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_queue_close_releases_blocked_pusher() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(producer.join().unwrap(), Err(2));

        // Queued items outlive the close; new ones are refused.
        assert_eq!(queue.force_push(3), Err(3));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }
}
