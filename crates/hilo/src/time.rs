use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// A trait for time sources that return a wall-clock timestamp in seconds.
///
/// The allocator only uses time to decide how fast a key exhausts its
/// batches, so second resolution is enough. Plug in a fixed or stepped source
/// in tests.
///
/// # Example
///
/// ```
/// use hilo::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> i64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_secs(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in seconds.
    fn current_secs(&self) -> i64;
}

/// Seconds since the Unix epoch, read from [`SystemTime`].
///
/// A clock set before 1970 reads as `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
            })
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_secs(&self) -> i64 {
        (**self).current_secs()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_secs(&self) -> i64 {
        (**self).current_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.current_secs() > 1_577_836_800);
    }

    #[test]
    fn shared_clock_delegates() {
        struct FixedTime;
        impl TimeSource for FixedTime {
            fn current_secs(&self) -> i64 {
                42
            }
        }

        let clock = Arc::new(FixedTime);
        assert_eq!(clock.current_secs(), 42);
        assert_eq!((&clock).current_secs(), 42);
    }
}
