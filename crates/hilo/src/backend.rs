use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};

use crate::config::MIN_FACTOR;

/// The slow, shared store that hands out ranges to an [`Allocator`].
///
/// `reserve` is called at most once per batch exhaustion per key, and never
/// twice concurrently for the same key. It may still be called concurrently
/// for different keys, so implementations must be thread-safe.
///
/// The allocator never retries; a backend that wants retries or timeouts
/// applies them inside `reserve`.
///
/// # Example
///
/// ```
/// use hilo::{Allocator, ReservationBackend};
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// /// Every key shares one global high-water mark.
/// #[derive(Default)]
/// struct Global(AtomicI64);
///
/// impl ReservationBackend for Global {
///     type Err = core::convert::Infallible;
///
///     fn reserve(&self, _key: &str, batch_size: i32, _seed: i32) -> Result<i64, Self::Err> {
///         let batch = i64::from(batch_size);
///         Ok(self.0.fetch_add(batch, Ordering::SeqCst) + batch)
///     }
/// }
///
/// let allocator = Allocator::new(Global::default());
/// assert_eq!(allocator.increment("a", 1).unwrap(), 1);
/// ```
///
/// [`Allocator`]: crate::Allocator
pub trait ReservationBackend: Send + Sync {
    /// The error returned when a reservation or reset notification fails.
    type Err: core::error::Error + Send + Sync + 'static;

    /// Reserves `batch_size` more values for `key` and returns the new upper
    /// bound (the threshold) the allocator may count up to.
    ///
    /// `seed` is passed through unchanged from the caller that triggered the
    /// reservation. Backends typically use it as the starting point of a key
    /// they have never seen.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the single caller whose increment triggered
    /// the reservation.
    fn reserve(&self, key: &str, batch_size: i32, seed: i32) -> Result<i64, Self::Err>;

    /// Called after `key` was reset to `value` in memory.
    ///
    /// The allocator logs and discards errors from this hook; the in-memory
    /// reset has already happened.
    ///
    /// # Errors
    ///
    /// Implementations may report a failure to persist the reset.
    fn on_reset(&self, key: &str, value: i64) -> Result<(), Self::Err> {
        let _ = (key, value);
        Ok(())
    }
}

impl<B: ReservationBackend + ?Sized> ReservationBackend for &B {
    type Err = B::Err;

    fn reserve(&self, key: &str, batch_size: i32, seed: i32) -> Result<i64, Self::Err> {
        (**self).reserve(key, batch_size, seed)
    }

    fn on_reset(&self, key: &str, value: i64) -> Result<(), Self::Err> {
        (**self).on_reset(key, value)
    }
}

impl<B: ReservationBackend + ?Sized> ReservationBackend for Arc<B> {
    type Err = B::Err;

    fn reserve(&self, key: &str, batch_size: i32, seed: i32) -> Result<i64, Self::Err> {
        (**self).reserve(key, batch_size, seed)
    }

    fn on_reset(&self, key: &str, value: i64) -> Result<(), Self::Err> {
        (**self).on_reset(key, value)
    }
}

/// A process-local [`ReservationBackend`] keeping one high-water mark per
/// key.
///
/// An unseen key starts at its `seed`; every reservation advances the mark by
/// the requested batch size and returns it. A reset to `value` moves the mark
/// to `value + MIN_FACTOR`, the range the allocator serves after a reset
/// without reserving.
///
/// Useful for tests, benchmarks, and single-process deployments where the
/// sequence does not need to survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    marks: Mutex<HashMap<String, i64>>,
    reservations: AtomicU64,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current high-water mark of `key`, if it was ever reserved
    /// or reset.
    pub fn high_water(&self, key: &str) -> Option<i64> {
        self.marks.lock().get(key).copied()
    }

    /// Returns how many reservations have been served across all keys.
    pub fn reservations(&self) -> u64 {
        self.reservations.load(Ordering::Relaxed)
    }
}

impl ReservationBackend for InMemoryBackend {
    type Err = core::convert::Infallible;

    fn reserve(&self, key: &str, batch_size: i32, seed: i32) -> Result<i64, Self::Err> {
        let mut marks = self.marks.lock();
        let mark = marks.entry(key.to_owned()).or_insert(i64::from(seed));
        *mark = mark.saturating_add(i64::from(batch_size));
        self.reservations.fetch_add(1, Ordering::Relaxed);
        Ok(*mark)
    }

    fn on_reset(&self, key: &str, value: i64) -> Result<(), Self::Err> {
        self.marks
            .lock()
            .insert(key.to_owned(), value.saturating_add(i64::from(MIN_FACTOR)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_backend_advances_per_key() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.reserve("a", 10, 0).unwrap(), 10);
        assert_eq!(backend.reserve("a", 20, 0).unwrap(), 30);
        assert_eq!(backend.reserve("b", 10, 0).unwrap(), 10);
        assert_eq!(backend.reservations(), 3);
        assert_eq!(backend.high_water("a"), Some(30));
        assert_eq!(backend.high_water("c"), None);
    }

    #[test]
    fn in_memory_backend_seeds_unseen_keys() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.reserve("a", 10, 100).unwrap(), 110);
        // The seed only applies to the first reservation.
        assert_eq!(backend.reserve("a", 10, 500).unwrap(), 120);
    }

    #[test]
    fn in_memory_backend_reset_overwrites_mark() {
        let backend = InMemoryBackend::new();
        backend.reserve("a", 10, 0).unwrap();
        backend.on_reset("a", 3).unwrap();
        assert_eq!(backend.high_water("a"), Some(13));
        assert_eq!(backend.reserve("a", 10, 0).unwrap(), 23);
    }

    #[test]
    fn shared_backend_delegates() {
        let backend = Arc::new(InMemoryBackend::new());
        let shared = Arc::clone(&backend);
        assert_eq!(shared.reserve("a", 10, 0).unwrap(), 10);
        assert_eq!(backend.reservations(), 1);
    }
}
