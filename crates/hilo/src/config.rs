//! Allocator configuration and the constants bounding batch sizes and
//! registry growth.

use crate::error::{Error, Result};

/// Smallest batch the allocator will ever reserve.
pub const MIN_FACTOR: i32 = 10;

/// Largest batch the allocator will ever reserve.
pub const MAX_FACTOR: i32 = 10_000;

/// Seconds since the previous reservation at which the batch size stays
/// unchanged. Exhausting a batch faster grows the next one, slower shrinks it.
pub const DECAY_WINDOW_SECS: i64 = 300;

/// Smallest accepted initial registry capacity.
pub const MIN_CAPACITY: usize = 8;

/// Initial registry capacity used by [`AllocatorConfig::default`].
pub const DEFAULT_CAPACITY: usize = 64;

/// Hard cap on the number of keys. Doubling stops here so the capacity never
/// overflows.
pub const MAX_CAPACITY: usize = 0x7FEF_FFFF;

/// Tunables for an [`Allocator`].
///
/// [`Allocator`]: crate::Allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AllocatorConfig {
    /// Number of keys the registry can hold before its first resize.
    pub initial_capacity: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AllocatorConfig {
    /// Returns a config with the given initial capacity.
    pub const fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    /// Checks that every field is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `initial_capacity` is below
    /// [`MIN_CAPACITY`] or above [`MAX_CAPACITY`].
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity < MIN_CAPACITY {
            return Err(Error::InvalidArgument {
                reason: "initial capacity is below the minimum of 8",
            });
        }
        if self.initial_capacity > MAX_CAPACITY {
            return Err(Error::InvalidArgument {
                reason: "initial capacity exceeds the registry maximum",
            });
        }
        Ok(())
    }
}
