use thiserror::Error;

/// A result type whose error is infallible by default.
///
/// Operations that may reach the [`ReservationBackend`] carry the backend's
/// error type as `E`.
///
/// [`ReservationBackend`]: crate::ReservationBackend
pub type Result<T, E = core::convert::Infallible> = core::result::Result<T, Error<E>>;

/// All errors that `hilo` can produce.
///
/// The generic parameter `E` is the error type of the reservation backend and
/// is only carried by [`Error::Backend`]. Operations that never call the
/// backend use the default `Infallible`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error<E = core::convert::Infallible> {
    /// A caller-supplied argument was rejected (empty key, capacity out of
    /// range, ...).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: &'static str,
    },

    /// The reservation backend failed while reserving a new batch.
    ///
    /// Only the caller that won the reservation race observes this error.
    /// Concurrent callers on the same key keep incrementing.
    #[error("reservation for key `{key}` failed: {source}")]
    Backend {
        /// The key whose batch could not be reserved.
        key: String,
        /// The error raised by the backend.
        #[source]
        source: E,
    },

    /// Applying the interval would take the key's counter past `i64::MAX` or
    /// below `i64::MIN`. The counter is left unchanged.
    #[error("counter for key `{key}` would overflow")]
    Overflow {
        /// The key whose counter refused the interval.
        key: String,
    },

    /// The registry reached its maximum number of keys.
    #[error("registry capacity exhausted ({capacity} keys)")]
    CapacityExhausted {
        /// The capacity that could not be grown further.
        capacity: usize,
    },

    /// The allocator was torn down with [`Allocator::dispose`].
    ///
    /// [`Allocator::dispose`]: crate::Allocator::dispose
    #[error("allocator has been disposed")]
    Disposed,
}

impl Error<core::convert::Infallible> {
    /// Widens an error that cannot carry a backend failure into one with any
    /// backend error type.
    pub(crate) fn widen<E>(self) -> Error<E> {
        match self {
            Self::InvalidArgument { reason } => Error::InvalidArgument { reason },
            Self::Backend { source, .. } => match source {},
            Self::Overflow { key } => Error::Overflow { key },
            Self::CapacityExhausted { capacity } => Error::CapacityExhausted { capacity },
            Self::Disposed => Error::Disposed,
        }
    }
}
