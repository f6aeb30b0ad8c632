//! Multiple-producer, single-consumer queue backing the scheduler inbox.
//!
//! Every producer (`Sender`) owns a bounded ring; the single consumer
//! round-robins across all registered senders plus an unbounded
//! overflow deque reserved for the owning thread's own submissions
//! (e.g. the GC timer). See `spec.md` §4.B.

use super::ring::{Notify, RingState};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Lane<T> {
    ring: RingState<T>,
    full_notify: Notify,
}

/// One producer's handle onto the queue. Cheap to clone.
pub struct Sender<T> {
    lane: Arc<Lane<T>>,
    empty_notify: Arc<Notify>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            lane: Arc::clone(&self.lane),
            empty_notify: Arc::clone(&self.empty_notify),
        }
    }
}

impl<T> Sender<T> {
    /// Pushes `value`, blocking while this sender's ring is full.
    pub fn send(&self, mut value: T) {
        loop {
            match self.lane.ring.try_push(value) {
                Ok(()) => {
                    self.empty_notify.notify_one();
                    return;
                }
                Err(back) => {
                    value = back;
                    self.lane.full_notify.wait();
                }
            }
        }
    }
}

/// The scheduler's inbox: many [`Sender`]s, one consumer.
pub struct Mpsc<T> {
    lanes: Mutex<Vec<Arc<Lane<T>>>>,
    empty_notify: Arc<Notify>,
    overflow: Mutex<VecDeque<T>>,
    // Padded to its own cache line: every `pop()` bumps this on the
    // consumer thread while senders on other cores are touching
    // `lanes`/`overflow` right next to it.
    cursor: CachePadded<AtomicUsize>,
    capacity: usize,
}

impl<T> Mpsc<T> {
    /// `capacity` is each registered sender's ring capacity (a power of two).
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: Mutex::new(Vec::new()),
            empty_notify: Arc::new(Notify::new()),
            overflow: Mutex::new(VecDeque::new()),
            cursor: CachePadded::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Registers a new producer endpoint.
    pub fn new_sender(&self) -> Sender<T> {
        let lane = Arc::new(Lane {
            ring: RingState::new(self.capacity),
            full_notify: Notify::new(),
        });
        self.lanes.lock().push(Arc::clone(&lane));
        Sender {
            lane,
            empty_notify: Arc::clone(&self.empty_notify),
        }
    }

    /// Pushes directly onto the unbounded overflow deque, bypassing
    /// every registered sender's ring. Used by the consumer's own
    /// thread to self-submit commands (e.g. the GC timer) without
    /// needing a `Sender`.
    pub fn push_direct(&self, value: T) {
        self.overflow.lock().push_back(value);
        self.empty_notify.notify_one();
    }

    /// Blocks until a value is available, round-robining across
    /// senders and the overflow deque.
    pub fn pop(&self) -> T {
        loop {
            let lanes: Vec<Arc<Lane<T>>> = self.lanes.lock().clone();
            let n = lanes.len();
            for _ in 0..=n {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % (n + 1);
                if idx == n {
                    if let Some(v) = self.overflow.lock().pop_front() {
                        return v;
                    }
                } else if let Some(v) = lanes[idx].ring.try_pop() {
                    lanes[idx].full_notify.notify_one();
                    return v;
                }
            }
            self.empty_notify.wait();
        }
    }

    /// Diagnostic: total items queued across every lane plus overflow.
    pub fn len_hint(&self) -> usize {
        let lanes = self.lanes.lock();
        let lane_total: usize = lanes.iter().map(|l| l.ring.len()).sum();
        lane_total + self.overflow.lock().len()
    }

    /// Diagnostic: `true` when [`Mpsc::len_hint`] observed zero.
    pub fn is_empty_hint(&self) -> bool {
        self.len_hint() == 0
    }
}
