//! Single-producer, multi-consumer (SPMC) broadcast ring buffer.
//!
//! One producer inserts items; every registered consumer walks the ring with
//! its own cursor. Unlike an overwrite-on-lap ring, a slot is only reused once
//! *every* live consumer has moved past it, so each consumer sees every
//! retained item exactly once, in insertion order.
//!
//! # Design
//! - **Head**: sequence number of the next insert.
//! - **Cursors**: one per registered consumer, the sequence number of the next
//!   item that consumer will read.
//! - **Oldest tail**: `min(cursors)`, or `head` when nobody is registered. Slots
//!   in `oldest_tail..head` are retained; the ring is full when that range spans
//!   the whole capacity.
//!
//! A stalled consumer therefore holds the ring for everyone: once it fills,
//! inserts are refused (the producer drops) until that consumer catches up or
//! unregisters.
//!
//! # Thread Safety
//! All state lives behind one mutex. Every operation is O(1) except the
//! watermark recomputation, which is O(consumers).

use crate::ring::{RingConfig, lock, seq_to_index};
use std::collections::HashMap;
use std::sync::Mutex;

/// Handle to a consumer cursor registered with a [`BroadcastRing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

/// Bounded broadcast ring whose retention is driven by the slowest consumer.
pub struct BroadcastRing<T> {
    inner: Mutex<Inner<T>>,
    capacity: u64,
    /// Bitmask for index calculation when the capacity is a power of 2.
    mask: Option<u64>,
}

struct Inner<T> {
    slots: Box<[Option<T>]>,
    head: u64,
    oldest_tail: u64,
    cursors: HashMap<ConsumerId, u64>,
    next_consumer: u64,
}

impl<T> Inner<T> {
    #[inline]
    fn retained(&self) -> u64 {
        self.head - self.oldest_tail
    }

    fn recompute_oldest_tail(&mut self) -> u64 {
        self.oldest_tail = self.cursors.values().copied().min().unwrap_or(self.head);
        self.oldest_tail
    }
}

impl<T> BroadcastRing<T> {
    /// Creates an empty ring with `cfg.capacity` slots and no consumers.
    pub fn new(cfg: RingConfig) -> Self {
        let slots = (0..cfg.capacity).map(|_| None).collect();
        Self {
            inner: Mutex::new(Inner {
                slots,
                head: 0,
                oldest_tail: 0,
                cursors: HashMap::new(),
                next_consumer: 0,
            }),
            capacity: cfg.capacity as u64,
            mask: cfg.mask(),
        }
    }

    #[inline(always)]
    fn index(&self, seq: u64) -> usize {
        seq_to_index(seq, self.capacity, self.mask)
    }

    /// Inserts `item` at the head without blocking.
    ///
    /// Returns the item back when the ring is full, in which case no ring state
    /// was touched. The previous occupant of the slot, if any, is dropped here.
    pub fn try_insert(&self, item: T) -> Result<(), T> {
        let mut inner = lock(&self.inner);
        if inner.retained() >= self.capacity {
            return Err(item);
        }
        let idx = self.index(inner.head);
        inner.slots[idx] = Some(item);
        inner.head += 1;
        if inner.cursors.is_empty() {
            inner.oldest_tail = inner.head;
        }
        Ok(())
    }

    /// Registers a new consumer whose cursor starts at the current oldest tail,
    /// so it receives the retained backlog before any new items.
    pub fn register_consumer(&self) -> ConsumerId {
        let mut inner = lock(&self.inner);
        let id = ConsumerId(inner.next_consumer);
        inner.next_consumer += 1;
        let start = inner.oldest_tail;
        inner.cursors.insert(id, start);
        id
    }

    /// Removes a consumer and recomputes the oldest tail.
    ///
    /// Returns `false` if the consumer was not registered.
    pub fn unregister_consumer(&self, id: ConsumerId) -> bool {
        let mut inner = lock(&self.inner);
        if inner.cursors.remove(&id).is_none() {
            return false;
        }
        inner.recompute_oldest_tail();
        true
    }

    /// Runs `f` on the item at the consumer's cursor while the ring lock is held.
    ///
    /// Returns `None` if the consumer is caught up or unknown.
    pub fn peek_with<R>(&self, id: ConsumerId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = lock(&self.inner);
        let cursor = *inner.cursors.get(&id)?;
        if cursor == inner.head {
            return None;
        }
        inner.slots[self.index(cursor)].as_ref().map(f)
    }

    /// Returns a copy of the item at the consumer's cursor.
    pub fn peek(&self, id: ConsumerId) -> Option<T>
    where
        T: Clone,
    {
        self.peek_with(id, T::clone)
    }

    /// Advances the consumer's cursor by one and returns its new position.
    ///
    /// The oldest tail is not recomputed; call [`update_oldest_tail`] afterwards
    /// (or use [`consume_and_update`]). Returns `None` if the consumer is
    /// caught up or unknown.
    ///
    /// [`update_oldest_tail`]: Self::update_oldest_tail
    /// [`consume_and_update`]: Self::consume_and_update
    pub fn consume(&self, id: ConsumerId) -> Option<u64> {
        let mut inner = lock(&self.inner);
        let head = inner.head;
        let cursor = inner.cursors.get_mut(&id)?;
        if *cursor >= head {
            return None;
        }
        *cursor += 1;
        Some(*cursor)
    }

    /// Recomputes the retention watermark from the live cursors.
    pub fn update_oldest_tail(&self) -> u64 {
        lock(&self.inner).recompute_oldest_tail()
    }

    /// Advances the consumer's cursor and recomputes the watermark in one
    /// critical section.
    pub fn consume_and_update(&self, id: ConsumerId) -> Option<u64> {
        let mut inner = lock(&self.inner);
        let head = inner.head;
        let cursor = inner.cursors.get_mut(&id)?;
        if *cursor >= head {
            return None;
        }
        *cursor += 1;
        let next = *cursor;
        inner.recompute_oldest_tail();
        Some(next)
    }

    /// Whether an unread item sits at the consumer's cursor.
    pub fn has_pending(&self, id: ConsumerId) -> bool {
        let inner = lock(&self.inner);
        inner.cursors.get(&id).is_some_and(|&c| c < inner.head)
    }

    /// Number of inserts that would currently succeed.
    pub fn free_slots(&self) -> usize {
        let inner = lock(&self.inner);
        (self.capacity - inner.retained()) as usize
    }

    /// Number of retained items (`head - oldest_tail`).
    pub fn len(&self) -> usize {
        lock(&self.inner).retained() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn consumer_count(&self) -> usize {
        lock(&self.inner).cursors.len()
    }

    pub fn head(&self) -> u64 {
        lock(&self.inner).head
    }

    pub fn oldest_tail(&self) -> u64 {
        lock(&self.inner).oldest_tail
    }

    pub fn cursor(&self, id: ConsumerId) -> Option<u64> {
        lock(&self.inner).cursors.get(&id).copied()
    }
}
