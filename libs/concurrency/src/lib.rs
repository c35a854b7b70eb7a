//! Thread-safe concurrency primitives:
//! * [`map::ConcurrentMap`]: hash map with atomic compute-if-absent and snapshot accessors,
//! * [`future::Promise`] / [`future::Future`]: write-once values with blocking waits and
//!   non-blocking combinators,
//! * [`lock::ReentrantLock`]: mutual exclusion which its holder can re-acquire.
//!
//! The primitives are meant for OS threads (or other execution units, see
//! [`lock::IdentityProvider`]) provided by the caller; the crate doesn't manage any executor.

pub mod future;
pub mod lock;
pub mod map;
pub mod signal;
pub mod testonly;
pub mod time;
