use crate::sync::{Condvar, Mutex, lock, wait, wait_timeout};
use core::{fmt, time::Duration};
use tracing::debug;

/// Bounded multi-producer multi-consumer FIFO shared by all workers.
///
/// Capacity is always a power of two so that wrap-around is a mask. A
/// producer that finds the queue full waits for a consumer for up to the
/// configured patience; if the queue is still full afterwards the overflow
/// counts as persistent and the ring doubles in place, keeping FIFO order.
/// Producers therefore never wait forever, even when every consumer is
/// itself producing.
///
/// Closing the queue wakes every blocked consumer. Consumers drain what is
/// left and then get `None`.
pub struct WorkQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    patience: Duration,
}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1).next_power_of_two())
                .map(|_| None)
                .collect(),
            head: 0,
            len: 0,
            closed: false,
        }
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn push(&mut self, item: T) {
        debug_assert!(!self.is_full(), "Ring::push: [1]");
        let tail = (self.head + self.len) & self.mask();
        self.slots[tail] = Some(item);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some(), "Ring::pop: [1]");
        self.head = (self.head + 1) & self.mask();
        self.len -= 1;
        item
    }

    /// Doubles the capacity, moving live items to the front in FIFO order.
    fn grow(&mut self) {
        let capacity = self.slots.len() * 2;
        let mut slots: Box<[Option<T>]> = (0..capacity).map(|_| None).collect();
        let len = self.len;
        for slot in slots.iter_mut().take(len) {
            *slot = self.pop();
        }
        self.slots = slots;
        self.head = 0;
        self.len = len;
    }
}

impl<T> WorkQueue<T> {
    /// Creates a queue holding at least `capacity` items before it grows.
    /// A full producer waits up to `patience` before growing the queue.
    pub fn new(capacity: usize, patience: Duration) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            patience,
        }
    }

    /// Appends `item`, blocking while the queue is full.
    pub fn enqueue(&self, item: T) {
        let mut ring = lock(&self.ring);
        if ring.is_full() {
            ring = wait_timeout(&self.not_full, ring, self.patience);
            if ring.is_full() {
                let from = ring.slots.len();
                ring.grow();
                debug!(from, to = ring.slots.len(), "work queue grown");
            }
        }
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Appends `item` unless the queue is full, in which case the item is
    /// handed back.
    ///
    /// # Errors
    /// Returns `item` when there is no free slot.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut ring = lock(&self.ring);
        if ring.is_full() {
            return Err(item);
        }
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` only once the queue is closed and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut ring = lock(&self.ring);
        loop {
            if let Some(item) = ring.pop() {
                drop(ring);
                self.not_full.notify_one();
                return Some(item);
            }
            if ring.closed {
                return None;
            }
            ring = wait(&self.not_empty, ring);
        }
    }

    /// Removes the oldest item if there is one.
    pub fn try_dequeue(&self) -> Option<T> {
        let item = lock(&self.ring).pop();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Marks the queue closed and wakes every blocked consumer.
    pub fn close(&self) {
        lock(&self.ring).closed = true;
        self.not_empty.notify_all();
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.ring).len
    }

    /// Whether no item is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of slots, always a power of two.
    #[must_use]
    pub fn capacity(&self) -> usize {
        lock(&self.ring).slots.len()
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = lock(&self.ring);
        f.debug_struct("WorkQueue")
            .field("len", &ring.len)
            .field("capacity", &ring.slots.len())
            .field("closed", &ring.closed)
            .finish_non_exhaustive()
    }
}
