//! Bounded FIFO with a single blocking consumer.
//!
//! Producers (the event loop) call [`CommandRing::enqueue`], which never
//! blocks and drops when the ring is full. The consumer parks in
//! [`CommandRing::pop_blocking`] until an item arrives or shutdown is
//! requested.
//!
//! # Wake protocol
//! The consumer reads the shutdown flag while holding the ring lock, and
//! [`CommandRing::notify_consumer`] takes that same lock before signalling.
//! Setting the flag and then calling `notify_consumer` therefore can never be
//! lost between the consumer's check and its wait.

use crate::ring::{RingConfig, lock, seq_to_index};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

pub struct CommandRing<T> {
    inner: Mutex<Inner<T>>,
    /// Signalled on "non-empty" and on shutdown.
    wake: Condvar,
    capacity: u64,
    mask: Option<u64>,
}

struct Inner<T> {
    slots: Box<[Option<T>]>,
    head: u64,
    tail: u64,
}

impl<T> CommandRing<T> {
    pub fn new(cfg: RingConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: (0..cfg.capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
            }),
            wake: Condvar::new(),
            capacity: cfg.capacity as u64,
            mask: cfg.mask(),
        }
    }

    #[inline(always)]
    fn index(&self, seq: u64) -> usize {
        seq_to_index(seq, self.capacity, self.mask)
    }

    fn pop_locked(&self, inner: &mut Inner<T>) -> Option<T> {
        if inner.head == inner.tail {
            return None;
        }
        let idx = self.index(inner.tail);
        inner.tail += 1;
        inner.slots[idx].take()
    }

    /// Appends `item` and wakes the consumer. Returns the item back if the
    /// ring is at capacity.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut inner = lock(&self.inner);
        if inner.head - inner.tail >= self.capacity {
            return Err(item);
        }
        let idx = self.index(inner.head);
        inner.slots[idx] = Some(item);
        inner.head += 1;
        self.wake.notify_one();
        Ok(())
    }

    /// Removes the oldest item without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut inner = lock(&self.inner);
        self.pop_locked(&mut inner)
    }

    /// Blocks until an item is available or `shutdown` is set.
    ///
    /// Items still queued when shutdown is requested are handed out first;
    /// `None` is returned only once the ring is empty and `shutdown` is set.
    pub fn pop_blocking(&self, shutdown: &AtomicBool) -> Option<T> {
        let mut inner = lock(&self.inner);
        loop {
            if let Some(item) = self.pop_locked(&mut inner) {
                return Some(item);
            }
            if shutdown.load(Ordering::Acquire) {
                return None;
            }
            inner = self
                .wake
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes every waiting consumer so it re-checks the shutdown flag.
    pub fn notify_consumer(&self) {
        let _inner = lock(&self.inner);
        self.wake.notify_all();
    }

    pub fn len(&self) -> usize {
        let inner = lock(&self.inner);
        (inner.head - inner.tail) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() as u64 >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}
