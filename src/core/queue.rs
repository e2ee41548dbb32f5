//! Bounded per-desk session queue
//!
//! Each desk owns one `WorkerQueue`. The dispatcher is the only producer and
//! the desk is the only consumer. All state sits behind one mutex, and a
//! condition variable wakes the desk on enqueue, on a monitor query and on
//! close, so an idle desk never spins.

use crate::types::{BankError, SessionDescriptor};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Default number of pending sessions a queue holds
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Result of a dequeue attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    /// Oldest pending session, now owned by the caller
    Session(SessionDescriptor),
    /// Nothing to serve (timed out or woken for another reason)
    Empty,
    /// Queue closed for shutdown; no further session will ever be handed out
    Closed,
}

/// A descriptor the queue refused, handed back so the caller can answer the client
#[derive(Debug)]
pub struct Rejected {
    pub descriptor: SessionDescriptor,
    pub reason: BankError,
}

/// Point-in-time view of a queue used by the load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLoad {
    pub len: usize,
    pub serving_customer: bool,
    pub closed: bool,
}

/// Fixed-capacity ring buffer with wrapping indices and an explicit size
#[derive(Debug)]
struct Ring {
    slots: Box<[Option<SessionDescriptor>]>,
    front: usize,
    len: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Ring {
            slots: (0..capacity).map(|_| None).collect(),
            front: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn push(&mut self, descriptor: SessionDescriptor) -> Result<(), SessionDescriptor> {
        if self.is_full() {
            return Err(descriptor);
        }
        let rear = (self.front + self.len) % self.capacity();
        self.slots[rear] = Some(descriptor);
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<SessionDescriptor> {
        if self.len == 0 {
            return None;
        }
        let descriptor = self.slots[self.front].take();
        self.front = (self.front + 1) % self.capacity();
        self.len -= 1;
        descriptor
    }
}

#[derive(Debug)]
struct QueueState {
    ring: Ring,
    /// Set by a successful dequeue, cleared by an empty one. Only informs the
    /// load balancer's tie-break.
    serving_customer: bool,
    closed: bool,
    /// A wake-up requested while the desk was not waiting
    wake_pending: bool,
}

/// Single-producer / single-consumer bounded queue of session descriptors
#[derive(Debug)]
pub struct WorkerQueue {
    index: usize,
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl WorkerQueue {
    /// Create an empty, open queue
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the owning desk, used in logs
    /// * `capacity` - Maximum number of pending descriptors (at least 1)
    pub fn new(index: usize, capacity: usize) -> Self {
        WorkerQueue {
            index,
            state: Mutex::new(QueueState {
                ring: Ring::new(capacity.max(1)),
                serving_customer: false,
                closed: false,
                wake_pending: false,
            }),
            ready: Condvar::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.state.lock().ring.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_serving(&self) -> bool {
        self.state.lock().serving_customer
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Length, serving flag and closed flag read under one lock
    pub fn load(&self) -> QueueLoad {
        let state = self.state.lock();
        QueueLoad {
            len: state.ring.len,
            serving_customer: state.serving_customer,
            closed: state.closed,
        }
    }

    /// Append a descriptor and wake the desk
    ///
    /// # Errors
    ///
    /// Hands the descriptor back with `QueueFull` at capacity or `QueueClosed`
    /// after [`WorkerQueue::close`].
    pub fn push(&self, descriptor: SessionDescriptor) -> Result<(), Rejected> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Rejected {
                descriptor,
                reason: BankError::QueueClosed,
            });
        }
        let capacity = state.ring.capacity();
        state.ring.push(descriptor).map_err(|descriptor| Rejected {
            descriptor,
            reason: BankError::QueueFull { capacity },
        })?;
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Pop the oldest descriptor without waiting
    pub fn dequeue(&self) -> Dequeued {
        let mut state = self.state.lock();
        Self::take(&mut state)
    }

    /// Pop the oldest descriptor, waiting up to `wait` for one to arrive
    ///
    /// Returns early with `Empty` when [`WorkerQueue::wake`] is called, so the
    /// desk can reach its safe point promptly.
    pub fn dequeue_timeout(&self, wait: Duration) -> Dequeued {
        let deadline = Instant::now() + wait;
        let mut state = self.state.lock();
        loop {
            if state.closed || state.ring.len > 0 {
                return Self::take(&mut state);
            }
            if state.wake_pending {
                state.wake_pending = false;
                return Self::take(&mut state);
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return Self::take(&mut state);
            }
        }
    }

    fn take(state: &mut QueueState) -> Dequeued {
        if state.closed {
            state.serving_customer = false;
            return Dequeued::Closed;
        }
        match state.ring.pop() {
            Some(descriptor) => {
                state.serving_customer = true;
                Dequeued::Session(descriptor)
            }
            None => {
                state.serving_customer = false;
                Dequeued::Empty
            }
        }
    }

    /// Interrupt a waiting desk so it re-checks its safe point
    pub fn wake(&self) {
        self.state.lock().wake_pending = true;
        self.ready.notify_all();
    }

    /// Close the queue and return the descriptors still pending
    ///
    /// After this returns no dequeue hands out a session and every push is
    /// rejected with `QueueClosed`.
    pub fn close(&self) -> Vec<SessionDescriptor> {
        let mut state = self.state.lock();
        state.closed = true;
        let mut discarded = Vec::with_capacity(state.ring.len);
        while let Some(descriptor) = state.ring.pop() {
            discarded.push(descriptor);
        }
        drop(state);
        self.ready.notify_all();
        discarded
    }

    #[cfg(test)]
    pub(crate) fn set_serving(&self, serving: bool) {
        self.state.lock().serving_customer = serving;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn descriptor(id: u64) -> SessionDescriptor {
        SessionDescriptor::new(id, format!("client-{}", id))
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkerQueue::new(0, 4);
        queue.push(descriptor(1)).unwrap();
        queue.push(descriptor(2)).unwrap();

        assert_eq!(queue.dequeue(), Dequeued::Session(descriptor(1)));
        assert_eq!(queue.dequeue(), Dequeued::Session(descriptor(2)));
        assert_eq!(queue.dequeue(), Dequeued::Empty);
    }

    #[test]
    fn test_ring_wraps_around_capacity() {
        let queue = WorkerQueue::new(0, 3);
        for round in 0..5u64 {
            queue.push(descriptor(round * 2)).unwrap();
            queue.push(descriptor(round * 2 + 1)).unwrap();
            assert_eq!(queue.len(), 2);
            assert_eq!(queue.dequeue(), Dequeued::Session(descriptor(round * 2)));
            assert_eq!(queue.dequeue(), Dequeued::Session(descriptor(round * 2 + 1)));
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_push_when_full_hands_descriptor_back() {
        let queue = WorkerQueue::new(0, 2);
        queue.push(descriptor(1)).unwrap();
        queue.push(descriptor(2)).unwrap();

        let rejected = queue.push(descriptor(3)).unwrap_err();

        assert_eq!(rejected.descriptor, descriptor(3));
        assert_eq!(rejected.reason, BankError::QueueFull { capacity: 2 });
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_serving_flag_follows_dequeue() {
        let queue = WorkerQueue::new(0, 2);
        assert!(!queue.is_serving());

        queue.push(descriptor(1)).unwrap();
        assert!(matches!(queue.dequeue(), Dequeued::Session(_)));
        assert!(queue.is_serving());

        assert_eq!(queue.dequeue(), Dequeued::Empty);
        assert!(!queue.is_serving());
    }

    #[test]
    fn test_close_discards_pending_and_rejects_push() {
        let queue = WorkerQueue::new(0, 4);
        queue.push(descriptor(1)).unwrap();
        queue.push(descriptor(2)).unwrap();

        let discarded = queue.close();

        assert_eq!(discarded, vec![descriptor(1), descriptor(2)]);
        assert_eq!(queue.dequeue(), Dequeued::Closed);
        let rejected = queue.push(descriptor(3)).unwrap_err();
        assert_eq!(rejected.reason, BankError::QueueClosed);
    }

    #[test]
    fn test_dequeue_timeout_expires_empty() {
        let queue = WorkerQueue::new(0, 1);
        assert_eq!(queue.dequeue_timeout(Duration::from_millis(5)), Dequeued::Empty);
    }

    #[test]
    fn test_waiting_consumer_woken_by_push() {
        let queue = Arc::new(WorkerQueue::new(0, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(descriptor(7)).unwrap();

        assert_eq!(consumer.join().unwrap(), Dequeued::Session(descriptor(7)));
    }

    #[test]
    fn test_waiting_consumer_woken_by_wake() {
        let queue = Arc::new(WorkerQueue::new(0, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.wake();

        assert_eq!(consumer.join().unwrap(), Dequeued::Empty);
    }

    #[test]
    fn test_waiting_consumer_woken_by_close() {
        let queue = Arc::new(WorkerQueue::new(0, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert_eq!(consumer.join().unwrap(), Dequeued::Closed);
    }
}
