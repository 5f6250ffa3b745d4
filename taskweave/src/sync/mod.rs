//! Synchronization primitives for taskweave.
//!
//! Every task guards its mutable state with its own lock, and the parallel
//! runner guards its outstanding-task counter the same way. This module
//! provides those locks:
//!
//! - [`RawSpinMutex`] — a busy-waiting compare-and-swap lock with no OS
//!   blocking, and [`SpinMutex`], its data-owning counterpart.
//! - [`ReentrantMutex`] — a lock that its owning thread may acquire
//!   repeatedly, and which can hand out [`Condition`] variables.
//!
//! Both raw locks implement the [`RawMutex`] contract, whose
//! [`critical_section`](RawMutex::critical_section) helper releases the lock
//! on every exit path, unwinding included.
//!
//! ## Design notes
//!
//! - Spin locks assume short critical sections. A waiting thread never
//!   parks; it re-reads the owner word until the lock looks free.
//! - Lock ownership is per OS thread. Releasing from a thread that does not
//!   own the lock is refused, not an unlock.

mod reentrant;
mod spin;

pub use reentrant::{Condition, ReentrantMutex};
pub use spin::{RawSpinMutex, SpinMutex, SpinMutexGuard};

/// The contract shared by the raw (data-less) mutexes.
///
/// Reentrancy differs between implementations. [`ReentrantMutex`] counts
/// every acquisition by its owner. [`RawSpinMutex`] does not count at all:
/// [`try_acquire`](Self::try_acquire) by the owner succeeds without effect,
/// while [`acquire`](Self::acquire) by the owner panics, since a caller
/// expecting to wait for the lock would otherwise release it early.
pub trait RawMutex: Send + Sync {
    /// Returns `true` if any thread currently holds the lock.
    fn is_acquired(&self) -> bool;

    /// Acquires the lock, waiting for as long as another thread holds it.
    fn acquire(&self);

    /// Attempts to acquire the lock without waiting.
    fn try_acquire(&self) -> bool;

    /// Releases the lock.
    ///
    /// Returns `false`, and leaves the lock untouched, if the calling thread
    /// does not hold it.
    fn release(&self) -> bool;

    /// Runs `f` while holding the lock.
    ///
    /// The lock is released when `f` returns or unwinds.
    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R
    where
        Self: Sized,
    {
        self.acquire();
        let _release = ReleaseOnDrop(self);

        f()
    }
}

/// Releases the wrapped mutex when dropped.
struct ReleaseOnDrop<'a, M: RawMutex>(&'a M);

impl<M: RawMutex> Drop for ReleaseOnDrop<'_, M> {
    fn drop(&mut self) {
        self.0.release();
    }
}
