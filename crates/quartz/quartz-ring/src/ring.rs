//! Ring buffer configuration and index arithmetic utilities.
//!
//! Both rings in this crate address their slots with monotonically increasing
//! `u64` sequence numbers. A sequence number is only reduced to a slot index at
//! the moment a slot is touched, so `head - tail` is always the number of
//! retained items and never needs wrap-around special cases.

/// Configuration for a ring buffer.
///
/// A power-of-two capacity lets index calculation use a bitmask, any other
/// non-zero capacity falls back to a modulo.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of slots in the ring.
    pub capacity: usize,
}

impl RingConfig {
    /// Creates a new ring configuration with the specified capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    ///
    /// # Example
    /// ```
    /// use quartz_ring::RingConfig;
    /// let cfg = RingConfig::new(8);
    /// assert_eq!(cfg.capacity, 8);
    /// ```
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be non-zero");
        Self { capacity }
    }

    /// Returns the bitmask for index calculation, or `None` when the capacity
    /// is not a power of 2.
    ///
    /// # Example
    /// ```
    /// use quartz_ring::RingConfig;
    /// assert_eq!(RingConfig::new(8).mask(), Some(7));
    /// assert_eq!(RingConfig::new(6).mask(), None);
    /// ```
    #[inline(always)]
    pub fn mask(&self) -> Option<u64> {
        self.capacity
            .is_power_of_two()
            .then(|| (self.capacity as u64) - 1)
    }
}

/// Converts a sequence number to a slot index.
///
/// With `capacity = 8` (mask = 7 = `0b111`):
/// ```text
/// seq =  0 → 0
/// seq =  5 → 5
/// seq =  8 → 0  (wraps around)
/// seq = 15 → 7
/// ```
///
/// With `capacity = 6` there is no mask and `seq % 6` is used instead.
#[inline(always)]
pub fn seq_to_index(seq: u64, capacity: u64, mask: Option<u64>) -> usize {
    match mask {
        Some(mask) => (seq & mask) as usize,
        None => (seq % capacity) as usize,
    }
}

/// Recovers the guard from a poisoned mutex.
///
/// Ring state is only ever mutated through short, non-panicking critical
/// sections, so a poisoned lock still protects consistent data.
#[inline]
pub(crate) fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
