mod growth;
mod registry;
mod slot;
mod status;

use core::convert::Infallible;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    allocator::{
        growth::{batch_size, next_growth_factor},
        registry::Registry,
        slot::Slot,
    },
    backend::ReservationBackend,
    config::AllocatorConfig,
    error::{Error, Result},
    time::{SystemClock, TimeSource},
};

pub use status::*;

/// A keyed sequence allocator that reserves ranges in batches.
///
/// Each key owns an independent counter. Increments are served from memory
/// with a single atomic update; only when a key's counter passes the upper bound
/// of its current batch does one caller reserve a new batch from the
/// [`ReservationBackend`]. Batch sizes grow when a key exhausts them quickly
/// and shrink when it goes idle.
///
/// ## Features
/// - ✅ Thread-safe, share it behind an [`Arc`] or a reference
/// - ✅ Increments for registered keys only share a read lock
/// - ✅ At most one reservation in flight per key
/// - ❌ No coordination across processes beyond what the backend provides
///
/// ## Locking
/// The registry (key to slot map) sits behind a reader/writer lock. Hot-path
/// increments hold the read side while resolving the key and applying the
/// add, and only clone the slot handle when they go on to reserve.
/// Registering a new key, [`Allocator::reset`], and [`Allocator::dispose`]
/// take the write side. The backend is never called while the registry lock
/// is held by a reservation.
///
/// # Example
/// ```
/// use hilo::{Allocator, InMemoryBackend};
/// use std::{sync::Arc, thread};
///
/// let allocator = Arc::new(Allocator::new(InMemoryBackend::new()));
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let allocator = Arc::clone(&allocator);
///         thread::spawn(move || {
///             (0..100)
///                 .map(|_| allocator.increment("invoice", 1).unwrap())
///                 .collect::<Vec<_>>()
///         })
///     })
///     .collect();
///
/// let mut all: Vec<i64> = handles
///     .into_iter()
///     .flat_map(|h| h.join().unwrap())
///     .collect();
/// all.sort_unstable();
/// assert_eq!(all, (1..=400).collect::<Vec<_>>());
/// ```
pub struct Allocator<B, T = SystemClock>
where
    B: ReservationBackend,
    T: TimeSource,
{
    registry: RwLock<Registry>,
    backend: B,
    clock: T,
    config: AllocatorConfig,
}

impl<B> Allocator<B, SystemClock>
where
    B: ReservationBackend,
{
    /// Creates an allocator with the default configuration, reading time
    /// from the system clock.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, SystemClock)
    }
}

impl<B, T> Allocator<B, T>
where
    B: ReservationBackend,
    T: TimeSource,
{
    /// Creates an allocator with the default configuration and a custom
    /// [`TimeSource`].
    pub fn with_clock(backend: B, clock: T) -> Self {
        let config = AllocatorConfig::default();
        Self {
            registry: RwLock::new(Registry::new(config.initial_capacity)),
            backend,
            clock,
            config,
        }
    }

    /// Creates an allocator from explicit parts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `config` fails
    ///   [`AllocatorConfig::validate`].
    /// - [`Error::CapacityExhausted`] if the initial registry cannot be
    ///   allocated.
    pub fn with_config(backend: B, clock: T, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: RwLock::new(Registry::with_capacity(config.initial_capacity)?),
            backend,
            clock,
            config,
        })
    }

    /// Adds `interval` to `key`'s counter and returns the new value.
    ///
    /// Registers `key` on first use. Equivalent to
    /// [`Self::increment_seeded`] with a seed of `0`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `key` is empty or blank.
    /// - [`Error::Backend`] if this call had to reserve a new batch and the
    ///   backend failed. The counter still advanced, so the value this call
    ///   produced is skipped rather than handed out later.
    /// - [`Error::Overflow`] if `interval` would take the counter past
    ///   `i64::MAX` or below `i64::MIN`. Nothing is handed out and the
    ///   counter keeps its value.
    /// - [`Error::CapacityExhausted`] if registering `key` would exceed the
    ///   registry's maximum size.
    /// - [`Error::Disposed`] after [`Self::dispose`].
    pub fn increment(&self, key: &str, interval: i64) -> Result<i64, B::Err> {
        self.increment_seeded(key, interval, 0)
    }

    /// Adds `interval` to `key`'s counter, passing `seed` to the backend if a
    /// reservation is triggered.
    ///
    /// # Errors
    ///
    /// See [`Self::increment`].
    pub fn increment_seeded(&self, key: &str, interval: i64, seed: i32) -> Result<i64, B::Err> {
        validate_key(key).map_err(Error::<Infallible>::widen)?;
        let (value, pending) = self
            .advance(key, interval)
            .map_err(Error::<Infallible>::widen)?;

        if let Some(slot) = pending {
            self.cold_reserve(key, &slot, value, seed)?;
        }
        Ok(value)
    }

    /// Subtracts `interval` from `key`'s counter and returns the new value.
    ///
    /// # Errors
    ///
    /// See [`Self::increment`]. Also returns [`Error::InvalidArgument`] if
    /// `interval` is `i64::MIN`.
    pub fn decrement(&self, key: &str, interval: i64) -> Result<i64, B::Err> {
        self.decrement_seeded(key, interval, 0)
    }

    /// Subtracts `interval` from `key`'s counter, passing `seed` to the
    /// backend if a reservation is triggered.
    ///
    /// # Errors
    ///
    /// See [`Self::decrement`].
    pub fn decrement_seeded(&self, key: &str, interval: i64, seed: i32) -> Result<i64, B::Err> {
        let interval = interval
            .checked_neg()
            .ok_or(Error::<B::Err>::InvalidArgument {
                reason: "interval cannot be negated",
            })?;
        self.increment_seeded(key, interval, seed)
    }

    /// Sets `key`'s counter to `value` and notifies the backend.
    ///
    /// The counter restarts with the smallest batch already granted, so the
    /// next [`Self::increment`] by one returns `value + 1` without reserving.
    ///
    /// Never blocks on a reservation in flight for `key`: in that case
    /// nothing changes and [`ResetStatus::Busy`] is returned. Resetting a key
    /// that was never incremented does not register it and returns
    /// [`ResetStatus::Unknown`].
    ///
    /// Errors from [`ReservationBackend::on_reset`] are logged and
    /// discarded; the in-memory reset stands.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `key` is empty or blank.
    /// - [`Error::Disposed`] after [`Self::dispose`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn reset(&self, key: &str, value: i64) -> Result<ResetStatus> {
        validate_key(key)?;
        let registry = self.registry.write();
        registry.ensure_live()?;

        let Some(slot) = registry.get(key) else {
            return Ok(ResetStatus::Unknown);
        };
        let Some(gate) = slot.try_acquire() else {
            return Ok(ResetStatus::Busy);
        };

        gate.reset(value, self.clock.current_secs());
        if let Err(_e) = self.backend.on_reset(key, value) {
            #[cfg(feature = "tracing")]
            tracing::warn!(key, value, error = %_e, "reset notification failed");
        }
        Ok(ResetStatus::Applied)
    }

    /// Returns the last value handed out for `key`, without registering it.
    pub fn try_get_value(&self, key: &str) -> Option<i64> {
        self.registry.read().get(key).map(|slot| slot.value())
    }

    /// Returns a copy of `key`'s full counter state, without registering it.
    pub fn snapshot(&self, key: &str) -> Option<SlotSnapshot> {
        self.registry.read().get(key).map(|slot| slot.snapshot())
    }

    /// Returns `true` if `key` has been registered.
    pub fn contains_key(&self, key: &str) -> bool {
        self.registry.read().get(key).is_some()
    }

    /// Returns the registered keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.registry.read().keys()
    }

    /// Returns the number of registered keys.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    /// Returns `true` if no key has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many keys fit before the registry grows again.
    pub fn capacity(&self) -> usize {
        self.registry.read().capacity()
    }

    /// Returns `true` once [`Self::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.registry.read().is_disposed()
    }

    /// Returns the reservation backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the configuration this allocator was built with.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Releases every key and slot. Returns how many keys were released.
    ///
    /// Every later call that would mutate state returns
    /// [`Error::Disposed`]; read-only queries report nothing.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn dispose(&self) -> usize {
        let released = self.registry.write().dispose();
        #[cfg(feature = "tracing")]
        tracing::debug!(released, "allocator disposed");
        released
    }

    /// Adds `interval` to `key`'s counter, registering the key if needed.
    ///
    /// Returns the new value and, if it passed the threshold, a handle to the
    /// slot so the caller can reserve after the registry lock is released.
    #[inline]
    fn advance(&self, key: &str, interval: i64) -> Result<(i64, Option<Arc<Slot>>)> {
        {
            let registry = self.registry.read();
            registry.ensure_live()?;
            if let Some(slot) = registry.get(key) {
                return step(key, slot, interval);
            }
        }
        let slot = self.cold_register(key)?;
        step(key, &slot, interval)
    }

    #[cold]
    #[inline(never)]
    fn cold_register(&self, key: &str) -> Result<Arc<Slot>> {
        let registry = self.registry.upgradable_read();
        registry.ensure_live()?;
        // Another thread may have registered the key while we waited.
        if let Some(slot) = registry.get(key) {
            return Ok(Arc::clone(slot));
        }
        let mut registry = RwLockUpgradableReadGuard::upgrade(registry);
        registry.insert(key)
    }

    /// Reserves the next batch for `key` unless another caller already is.
    ///
    /// `value` is what this caller's add produced.
    #[cold]
    #[inline(never)]
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "trace",
            skip(self, slot),
            fields(batch_size = tracing::field::Empty)
        )
    )]
    fn cold_reserve(
        &self,
        key: &str,
        slot: &Slot,
        value: i64,
        seed: i32,
    ) -> Result<(), B::Err> {
        let Some(gate) = slot.try_acquire() else {
            // Someone else is reserving; our value is already ours.
            return Ok(());
        };

        let threshold = gate.threshold();
        if value <= threshold {
            // A reservation completed between our add and taking the gate.
            return Ok(());
        }

        let now = self.clock.current_secs();
        let factor = next_growth_factor(gate.growth_factor(), gate.timestamp(), now);
        // Everything issued past the threshold beyond the first value, which
        // the batch covers anyway.
        let overshoot = slot.value().saturating_sub(threshold).saturating_sub(1);
        let batch = batch_size(factor, overshoot);

        #[cfg(feature = "tracing")]
        tracing::Span::current().record("batch_size", batch);

        match self.backend.reserve(key, batch, seed) {
            Ok(next) => {
                gate.commit(next, factor, now);
                #[cfg(feature = "tracing")]
                tracing::trace!(key, batch, threshold = next, "reserved batch");
                Ok(())
            }
            Err(source) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, batch, error = %source, "batch reservation failed");
                Err(Error::Backend {
                    key: key.to_owned(),
                    source,
                })
            }
        }
    }
}

#[inline]
fn step(key: &str, slot: &Arc<Slot>, interval: i64) -> Result<(i64, Option<Arc<Slot>>)> {
    let value = slot.advance(interval).ok_or_else(|| Error::Overflow {
        key: key.to_owned(),
    })?;
    let pending = (value > slot.threshold()).then(|| Arc::clone(slot));
    Ok((value, pending))
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidArgument {
            reason: "key must not be empty",
        });
    }
    Ok(())
}
