/// The outcome of [`Allocator::reset`].
///
/// A reset never blocks on an in-flight reservation. Callers that must see
/// the reset applied retry on [`ResetStatus::Busy`].
///
/// # Example
///
/// ```
/// use hilo::{Allocator, InMemoryBackend, ResetStatus};
///
/// let allocator = Allocator::new(InMemoryBackend::new());
/// allocator.increment("order", 1).unwrap();
///
/// loop {
///     match allocator.reset("order", 5).unwrap() {
///         ResetStatus::Applied => break,
///         ResetStatus::Busy => std::thread::yield_now(),
///         ResetStatus::Unknown => unreachable!("key was registered above"),
///     }
/// }
/// assert_eq!(allocator.increment("order", 1).unwrap(), 6);
/// ```
///
/// [`Allocator::reset`]: crate::Allocator::reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResetStatus {
    /// The counter now holds the requested value.
    Applied,
    /// A reservation for the key was in flight; nothing changed.
    Busy,
    /// The key was never registered; nothing changed and the key was not
    /// created.
    Unknown,
}

impl ResetStatus {
    /// Returns `true` for [`ResetStatus::Applied`].
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A point-in-time copy of one key's counter state.
///
/// Fields are read one at a time, so a snapshot taken while other threads
/// increment the key may mix states from slightly different moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotSnapshot {
    /// The last value handed out.
    pub value: i64,
    /// The upper bound of the current batch.
    pub threshold: i64,
    /// Wall-clock seconds of the last successful reservation or reset.
    /// `None` until the first one completes.
    pub last_reserved_at: Option<i64>,
    /// The batch size the growth heuristic will scale from next time.
    pub growth_factor: i32,
    /// Whether a reservation (or reset) holds the key's gate.
    pub reserving: bool,
}
