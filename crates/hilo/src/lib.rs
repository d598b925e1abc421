#![cfg_attr(docsrs, feature(doc_cfg))]
//! Keyed sequence allocator with batched range reservation.
//!
//! An [`Allocator`] hands out strictly increasing integers per key. Instead of
//! asking the backing store for every value, it reserves a range ("batch") at
//! a time through a [`ReservationBackend`] and serves increments from memory
//! until the range is exhausted. Batch sizes adapt to how quickly a key burns
//! through its ranges.
//!
//! # Example
//!
//! ```
//! use hilo::{Allocator, InMemoryBackend};
//!
//! let allocator = Allocator::new(InMemoryBackend::new());
//!
//! assert_eq!(allocator.increment("order", 1).unwrap(), 1);
//! assert_eq!(allocator.increment("order", 1).unwrap(), 2);
//! assert_eq!(allocator.increment("invoice", 1).unwrap(), 1);
//! assert_eq!(allocator.try_get_value("order"), Some(2));
//! ```

mod allocator;
mod backend;
mod config;
mod error;
mod time;

pub use crate::allocator::*;
pub use crate::backend::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::time::*;
