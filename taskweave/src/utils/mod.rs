//! Internal helpers shared by the synchronization primitives and runners.
//!
//! - [`thread`] hands out small integer identities for OS threads, used as
//!   owner words by the spin and reentrant mutexes.
//! - [`backoff`] implements the waiting strategies used by busy-polling
//!   loops.

pub(crate) mod backoff;
pub(crate) mod thread;

pub use backoff::BackoffPolicy;
