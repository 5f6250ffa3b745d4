use super::RawMutex;
use crate::utils::thread::{UNOWNED, current_token};

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// A busy-waiting mutual exclusion lock.
///
/// The lock word stores the token of the owning thread, or zero when the
/// lock is free. Acquisition is a compare-and-swap from "free" to "mine";
/// while it fails the caller re-reads the word in a spin loop. The thread
/// is never parked, so critical sections must stay short.
pub struct RawSpinMutex {
    /// Token of the owning thread, or `UNOWNED`.
    owner: AtomicU64,
}

impl RawSpinMutex {
    /// Creates an unlocked mutex.
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(UNOWNED),
        }
    }

    /// Returns `true` if the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == current_token()
    }

    fn try_claim(&self, me: u64) -> bool {
        self.owner
            .compare_exchange(UNOWNED, me, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawMutex for RawSpinMutex {
    fn is_acquired(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNOWNED
    }

    /// Spins until the lock is acquired.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread already holds the lock; spinning on it
    /// would never terminate.
    fn acquire(&self) {
        let me = current_token();

        assert_ne!(
            self.owner.load(Ordering::Relaxed),
            me,
            "RawSpinMutex::acquire called by the thread that already holds it"
        );

        loop {
            if self.try_claim(me) {
                return;
            }

            // Wait on a plain load so contending threads don't hammer the
            // cache line with failed CAS attempts.
            while self.owner.load(Ordering::Relaxed) != UNOWNED {
                hint::spin_loop();
            }
        }
    }

    /// Makes a single acquisition attempt.
    ///
    /// Succeeds without side effects when the calling thread already holds
    /// the lock. Ownership is not counted: one [`release`](Self::release)
    /// frees it regardless.
    fn try_acquire(&self) -> bool {
        let me = current_token();

        self.owner.load(Ordering::Relaxed) == me || self.try_claim(me)
    }

    fn release(&self) -> bool {
        self.owner
            .compare_exchange(current_token(), UNOWNED, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for RawSpinMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawSpinMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSpinMutex")
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

/// A spin lock protecting a value of type `T`.
///
/// This is the lock each task uses for its own state. Unlike
/// [`RawSpinMutex::try_acquire`], access through this type is never
/// reentrant: handing out a second `&mut T` on the owning thread would
/// alias the first.
pub struct SpinMutex<T> {
    raw: RawSpinMutex,

    /// The protected value.
    ///
    /// Only reachable through a guard, which exists only while `raw` is
    /// held by the guard's thread.
    data: UnsafeCell<T>,
}

// Safety: the value is moved between threads only as a whole.
unsafe impl<T: Send> Send for SpinMutex<T> {}
// Safety: access to the value is serialized by the lock word, so sharing
// the mutex only ever gives one thread at a time a reference to `T`.
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    /// Creates an unlocked mutex holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawSpinMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock and returns a guard giving access to the value.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread already holds this lock.
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        self.raw.acquire();

        SpinMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Attempts to acquire the lock without spinning.
    ///
    /// Returns `None` if any thread, the calling one included, holds it.
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        if self.raw.try_claim(current_token()) {
            Some(SpinMutexGuard {
                mutex: self,
                _not_send: PhantomData,
            })
        } else {
            None
        }
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// The lock is released when `f` returns or unwinds.
    pub fn critical_section<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();

        f(&mut guard)
    }

    /// Returns `true` if some thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.raw.is_acquired()
    }

    /// Returns a mutable reference to the value without locking.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex and returns the value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for SpinMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for SpinMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinMutex")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`SpinMutex::lock`].
///
/// Releases the lock when dropped. The guard cannot leave its thread, since
/// only the owning thread may release the lock.
pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.raw.release();
    }
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard exists only while this thread holds the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: see `deref`; `&mut self` rules out a second borrow.
        unsafe { &mut *self.mutex.data.get() }
    }
}
