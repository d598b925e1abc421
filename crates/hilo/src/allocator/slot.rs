use portable_atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};

use crate::{
    allocator::SlotSnapshot,
    config::{MAX_FACTOR, MIN_FACTOR},
};

/// Timestamp of a slot that has never completed a reservation.
pub(crate) const NEVER: i64 = i64::MIN;

/// Per-key counter state.
///
/// Every field is atomic so a slot can be shared across threads without a
/// lock. `value` is the only field written outside the reservation gate; all
/// other writes go through a [`ReserveGuard`], so at most one thread mutates
/// them at a time.
pub(crate) struct Slot {
    #[cfg(feature = "cache-padded")]
    value: crossbeam_utils::CachePadded<AtomicI64>,
    #[cfg(not(feature = "cache-padded"))]
    value: AtomicI64,
    threshold: AtomicI64,
    timestamp: AtomicI64,
    growth_factor: AtomicI32,
    reserving: AtomicBool,
}

impl Slot {
    /// A fresh slot at zero whose first increment exceeds the threshold and
    /// reserves a batch of `MIN_FACTOR`.
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            value: crossbeam_utils::CachePadded::new(AtomicI64::new(0)),
            #[cfg(not(feature = "cache-padded"))]
            value: AtomicI64::new(0),
            threshold: AtomicI64::new(0),
            timestamp: AtomicI64::new(NEVER),
            growth_factor: AtomicI32::new(MIN_FACTOR),
            reserving: AtomicBool::new(false),
        }
    }

    /// Adds `interval` to the counter and returns the new value, or `None`
    /// (leaving the counter untouched) if the add would overflow.
    #[inline]
    pub(crate) fn advance(&self, interval: i64) -> Option<i64> {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(interval)
            })
            .ok()
            .map(|previous| previous + interval)
    }

    #[inline]
    pub(crate) fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn threshold(&self) -> i64 {
        self.threshold.load(Ordering::Acquire)
    }

    /// Tries to take the reservation gate. Returns `None` if another thread
    /// holds it.
    #[inline]
    pub(crate) fn try_acquire(&self) -> Option<ReserveGuard<'_>> {
        self.reserving
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ReserveGuard { slot: self })
    }

    pub(crate) fn snapshot(&self) -> SlotSnapshot {
        let timestamp = self.timestamp.load(Ordering::Acquire);
        SlotSnapshot {
            value: self.value(),
            threshold: self.threshold(),
            last_reserved_at: (timestamp != NEVER).then_some(timestamp),
            growth_factor: self.growth_factor.load(Ordering::Acquire),
            reserving: self.reserving.load(Ordering::Acquire),
        }
    }
}

/// Exclusive access to a slot's reservation state.
///
/// Dropping the guard reopens the gate, including when the holder unwinds or
/// returns early with an error.
pub(crate) struct ReserveGuard<'a> {
    slot: &'a Slot,
}

impl ReserveGuard<'_> {
    pub(crate) fn threshold(&self) -> i64 {
        self.slot.threshold()
    }

    pub(crate) fn timestamp(&self) -> i64 {
        self.slot.timestamp.load(Ordering::Acquire)
    }

    pub(crate) fn growth_factor(&self) -> i32 {
        self.slot.growth_factor.load(Ordering::Acquire)
    }

    /// Publishes a freshly reserved batch.
    pub(crate) fn commit(&self, threshold: i64, growth_factor: i32, now: i64) {
        debug_assert!((MIN_FACTOR..=MAX_FACTOR).contains(&growth_factor));
        self.slot
            .growth_factor
            .store(growth_factor, Ordering::Release);
        self.slot.timestamp.store(now, Ordering::Release);
        self.slot.threshold.store(threshold, Ordering::Release);
    }

    /// Rewinds the slot to `value` with the smallest batch already granted.
    pub(crate) fn reset(&self, value: i64, now: i64) {
        self.slot.value.store(value, Ordering::Release);
        self.slot.growth_factor.store(MIN_FACTOR, Ordering::Release);
        self.slot.timestamp.store(now, Ordering::Release);
        self.slot.threshold.store(
            value.saturating_add(i64::from(MIN_FACTOR)),
            Ordering::Release,
        );
    }
}

impl Drop for ReserveGuard<'_> {
    fn drop(&mut self) {
        self.slot.reserving.store(false, Ordering::Release);
    }
}
