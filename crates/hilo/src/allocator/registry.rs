use std::{collections::HashMap, sync::Arc};

use crate::{
    allocator::slot::Slot,
    config::MAX_CAPACITY,
    error::{Error, Result},
};

/// Key to slot mapping backed by an index-addressed arena.
///
/// A key's index is assigned once and never changes. The arena only ever
/// grows at its end; growing copies the slot handles into a larger buffer,
/// never the slot state, so handles held outside the registry stay valid.
pub(crate) struct Registry {
    index: HashMap<String, usize>,
    slots: Vec<Arc<Slot>>,
    capacity: usize,
    disposed: bool,
}

impl Registry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            capacity,
            disposed: false,
        }
    }

    /// Like [`Self::new`], but reports an allocation failure instead of
    /// aborting.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        let mut registry = Self {
            index: HashMap::new(),
            slots: Vec::new(),
            capacity: 0,
            disposed: false,
        };
        registry.reserve_to(capacity)?;
        Ok(registry)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Arc<Slot>> {
        self.index.get(key).map(|&idx| &self.slots[idx])
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the registered keys ordered by slot index.
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<(&String, usize)> =
            self.index.iter().map(|(key, &idx)| (key, idx)).collect();
        keys.sort_unstable_by_key(|&(_, idx)| idx);
        keys.into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Appends a slot for `key` at the next free index, doubling the arena
    /// first if it is full.
    ///
    /// The caller must have checked that `key` is absent.
    pub(crate) fn insert(&mut self, key: &str) -> Result<Arc<Slot>> {
        debug_assert!(!self.index.contains_key(key));

        if self.slots.len() == self.capacity {
            self.grow()?;
        }

        let idx = self.slots.len();
        let slot = Arc::new(Slot::new());
        self.slots.push(Arc::clone(&slot));
        self.index.insert(key.to_owned(), idx);

        #[cfg(feature = "tracing")]
        tracing::debug!(key, idx, "registered sequence key");

        Ok(slot)
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) -> Result<()> {
        if self.capacity >= MAX_CAPACITY {
            return Err(Error::CapacityExhausted {
                capacity: self.capacity,
            });
        }
        let next = self.capacity.saturating_mul(2).clamp(1, MAX_CAPACITY);

        #[cfg(feature = "tracing")]
        tracing::debug!(from = self.capacity, to = next, "growing slot registry");

        self.reserve_to(next)
    }

    fn reserve_to(&mut self, capacity: usize) -> Result<()> {
        let additional = capacity.saturating_sub(self.slots.len());
        let current = self.capacity;
        let exhausted = |_| Error::CapacityExhausted { capacity: current };
        self.slots.try_reserve_exact(additional).map_err(exhausted)?;
        self.index.try_reserve(additional).map_err(exhausted)?;
        self.capacity = capacity;
        Ok(())
    }

    /// Drops every key and slot and refuses further use. Returns how many
    /// keys were released.
    pub(crate) fn dispose(&mut self) -> usize {
        let released = self.slots.len();
        self.index = HashMap::new();
        self.slots = Vec::new();
        self.capacity = 0;
        self.disposed = true;
        released
    }
}
