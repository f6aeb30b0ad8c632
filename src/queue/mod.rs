//! Bounded lock-free-ish command queues used for scheduler/worker
//! hand-off. See `spec.md` §4.B.

mod mpsc;
mod ring;
mod spmc;

pub use mpsc::{Mpsc, Sender as MpscSender};
pub use spmc::{Receiver as SpmcReceiver, Spmc};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn mpsc_round_trips_values_in_fifo_order_per_sender() {
        let queue = Arc::new(Mpsc::<u32>::new(4));
        let sender = queue.new_sender();
        for i in 0..4 {
            sender.send(i);
        }
        for i in 0..4 {
            assert_eq!(queue.pop(), i);
        }
    }

    #[test]
    fn mpsc_blocks_when_full_and_unblocks_on_pop() {
        let queue = Arc::new(Mpsc::<u32>::new(1));
        let sender = queue.new_sender();
        sender.send(1);
        let queue2 = Arc::clone(&queue);
        let sender2 = sender.clone();
        let handle = thread::spawn(move || {
            sender2.send(2);
        });
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        assert_eq!(queue2.pop(), 1);
        handle.join().unwrap();
        assert_eq!(queue2.pop(), 2);
    }

    #[test]
    fn mpsc_overflow_deque_bypasses_sender_rings() {
        let queue = Mpsc::<u32>::new(4);
        queue.push_direct(42);
        assert_eq!(queue.pop(), 42);
    }

    #[test]
    fn spmc_dispatches_round_robin_across_receivers() {
        let queue = Spmc::<u32>::new(4);
        let r1 = queue.new_receiver();
        let r2 = queue.new_receiver();
        queue.dispatch(1);
        queue.dispatch(2);
        assert_eq!(r1.recv(), 1);
        assert_eq!(r2.recv(), 2);
    }
}
