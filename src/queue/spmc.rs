//! Single-producer, multiple-consumer queue backing the worker inbox.
//!
//! The producer dispatches round-robin across registered receivers;
//! each receiver blocks on its own empty condvar, and the producer
//! blocks on one shared full condvar when every receiver's ring is
//! full. See `spec.md` §4.B.

use super::ring::{Notify, RingState};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Lane<T> {
    ring: RingState<T>,
    empty_notify: Notify,
}

/// One worker's handle onto the queue. Cheap to clone.
pub struct Receiver<T> {
    lane: Arc<Lane<T>>,
    full_notify: Arc<Notify>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            lane: Arc::clone(&self.lane),
            full_notify: Arc::clone(&self.full_notify),
        }
    }
}

impl<T> Receiver<T> {
    /// Blocks until a value lands in this receiver's ring.
    pub fn recv(&self) -> T {
        loop {
            if let Some(v) = self.lane.ring.try_pop() {
                self.full_notify.notify_one();
                return v;
            }
            self.lane.empty_notify.wait();
        }
    }
}

/// The worker pool's inbox: one producer, many [`Receiver`]s.
pub struct Spmc<T> {
    lanes: Mutex<Vec<Arc<Lane<T>>>>,
    full_notify: Arc<Notify>,
    // Padded so the dispatcher's round-robin counter doesn't bounce
    // between cores with `lanes`/`capacity` on the same cache line.
    cursor: CachePadded<AtomicUsize>,
    capacity: usize,
}

impl<T> Spmc<T> {
    /// `capacity` is each registered receiver's ring capacity (a power of two).
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: Mutex::new(Vec::new()),
            full_notify: Arc::new(Notify::new()),
            cursor: CachePadded::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Registers a new consumer endpoint.
    pub fn new_receiver(&self) -> Receiver<T> {
        let lane = Arc::new(Lane {
            ring: RingState::new(self.capacity),
            empty_notify: Notify::new(),
        });
        self.lanes.lock().push(Arc::clone(&lane));
        Receiver {
            lane,
            full_notify: Arc::clone(&self.full_notify),
        }
    }

    /// Dispatches `value` to the next receiver with room, blocking
    /// while every receiver's ring is full.
    pub fn dispatch(&self, mut value: T) {
        loop {
            let lanes: Vec<Arc<Lane<T>>> = self.lanes.lock().clone();
            let n = lanes.len();
            if n == 0 {
                self.full_notify.wait();
                continue;
            }
            for _ in 0..n {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
                match lanes[idx].ring.try_push(value) {
                    Ok(()) => {
                        lanes[idx].empty_notify.notify_one();
                        return;
                    }
                    Err(back) => value = back,
                }
            }
            self.full_notify.wait();
        }
    }

    /// Diagnostic: total items queued across every receiver.
    pub fn len_hint(&self) -> usize {
        self.lanes.lock().iter().map(|l| l.ring.len()).sum()
    }
}
