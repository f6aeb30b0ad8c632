//! Shared building blocks for the MPSC and SPMC command queues: a
//! bounded per-endpoint ring and a condvar a producer/consumer can park
//! on. See `spec.md` §4.B and §5.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// A condvar that self-heals a missed wakeup by re-checking its
/// predicate every `POLL_INTERVAL` instead of relying solely on being
/// signalled at exactly the right moment relative to the caller's own
/// lock-free state check.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) struct Notify {
    mutex: Mutex<()>,
    cond: Condvar,
}

impl Notify {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub fn wait(&self) {
        let mut guard = self.mutex.lock();
        self.cond.wait_for(&mut guard, POLL_INTERVAL);
    }

    pub fn notify_one(&self) {
        let _guard = self.mutex.lock();
        self.cond.notify_one();
    }
}

/// One endpoint's bounded queue: capacity `2^k`, FIFO within the
/// endpoint, shared between its owning producer/consumer and the
/// dispatch side that round-robins across endpoints.
pub(crate) struct RingState<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> RingState<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut guard = self.queue.lock();
        if guard.len() >= self.capacity {
            return Err(value);
        }
        guard.push_back(value);
        Ok(())
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
