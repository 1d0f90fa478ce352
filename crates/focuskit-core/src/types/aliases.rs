//! Type aliases for shared state that crosses task boundaries.
//!
//! The latest camera frame is written by the producer and read by the
//! blocking vision work; the alias keeps the lock choice in one place.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use focuskit_core::types::*;
//!
//! let latest: ThreadSafeRw<Option<Frame>> = thread_safe_rw(None);
//! ```

use parking_lot::RwLock;
use std::sync::Arc;

/// A thread-safe reader-writer lock wrapper for read-heavy workloads.
///
/// Use when reads greatly outnumber writes, such as the latest camera frame
/// which is written once per capture and read by every consumer.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// Create a new `ThreadSafeRw<T>` from a value.
#[inline]
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
