use super::RawMutex;
use crate::utils::thread::current_token;

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Ownership record of a [`ReentrantMutex`].
#[derive(Debug, Default)]
struct Ownership {
    /// Token of the owning thread, if any.
    owner: Option<u64>,

    /// Number of unmatched acquisitions by the owner.
    depth: usize,
}

struct Inner {
    state: Mutex<Ownership>,

    /// Signalled whenever the mutex becomes free.
    released: Condvar,
}

impl Inner {
    /// Locks the bookkeeping mutex.
    ///
    /// No code path panics while holding it, so poisoning carries no
    /// information and is ignored.
    fn state(&self) -> MutexGuard<'_, Ownership> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits on `released` until the mutex is free, then claims it for
    /// `me` with the given depth.
    fn claim<'a>(
        &'a self,
        mut state: MutexGuard<'a, Ownership>,
        me: u64,
        depth: usize,
    ) -> MutexGuard<'a, Ownership> {
        while state.owner.is_some_and(|owner| owner != me) {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.owner = Some(me);
        state.depth = depth;
        state
    }
}

/// A mutex its owning thread may acquire more than once.
///
/// Each [`acquire`](RawMutex::acquire) or successful
/// [`try_acquire`](RawMutex::try_acquire) must be matched by one
/// [`release`](RawMutex::release); the lock is freed when the last one runs.
/// Waiting threads block on the OS rather than spin.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone)]
pub struct ReentrantMutex {
    inner: Arc<Inner>,
}

impl ReentrantMutex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Ownership::default()),
                released: Condvar::new(),
            }),
        }
    }

    /// Returns `true` if the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.inner.state().owner == Some(current_token())
    }

    /// Number of unmatched acquisitions by the current owner.
    pub fn depth(&self) -> usize {
        self.inner.state().depth
    }

    /// Creates a condition variable bound to this mutex.
    pub fn create_condition(&self) -> Condition {
        Condition {
            mutex: self.clone(),
            signalled: Arc::new(Condvar::new()),
            generation: Arc::new(Mutex::new(0)),
        }
    }
}

impl RawMutex for ReentrantMutex {
    fn is_acquired(&self) -> bool {
        self.inner.state().owner.is_some()
    }

    fn acquire(&self) {
        let me = current_token();
        let state = self.inner.state();

        let depth = if state.owner == Some(me) {
            state.depth + 1
        } else {
            1
        };

        drop(self.inner.claim(state, me, depth));
    }

    fn try_acquire(&self) -> bool {
        let me = current_token();
        let mut state = self.inner.state();

        match state.owner {
            Some(owner) if owner == me => {
                state.depth += 1;
                true
            }
            Some(_) => false,
            None => {
                state.owner = Some(me);
                state.depth = 1;
                true
            }
        }
    }

    fn release(&self) -> bool {
        let me = current_token();
        let mut state = self.inner.state();

        if state.owner != Some(me) {
            return false;
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.inner.released.notify_all();
        }

        true
    }
}

impl Default for ReentrantMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();

        f.debug_struct("ReentrantMutex")
            .field("acquired", &state.owner.is_some())
            .field("depth", &state.depth)
            .finish()
    }
}

/// A condition variable bound to a [`ReentrantMutex`].
///
/// Waiting releases the mutex entirely (whatever its depth), blocks until
/// [`signal_all`](Self::signal_all) is called or the timeout elapses, then
/// reacquires the mutex with its previous depth before returning.
#[derive(Clone)]
pub struct Condition {
    mutex: ReentrantMutex,
    signalled: Arc<Condvar>,

    /// Bumped by every `signal_all`. Lets waiters tell a signal from a
    /// spurious wake-up. Guarded separately from the mutex bookkeeping so
    /// signalling never contends with lock hand-over.
    generation: Arc<Mutex<u64>>,
}

impl Condition {
    /// Waits until signalled.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the bound mutex.
    pub fn wait(&self) {
        self.wait_until(None);
    }

    /// Waits until signalled or until `timeout` has elapsed.
    ///
    /// Returns `true` if the wait ended because of a signal, `false` on
    /// timeout. The mutex is held again in both cases.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the bound mutex.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Some(Instant::now() + timeout))
    }

    /// Wakes every thread currently waiting on this condition.
    pub fn signal_all(&self) {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        *generation = generation.wrapping_add(1);
        drop(generation);

        self.signalled.notify_all();
    }

    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let me = current_token();
        let inner = &self.mutex.inner;

        // Snapshot the generation before giving up the mutex so a signal sent
        // right after the release is not missed.
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let start = *generation;

        let depth = {
            let mut state = inner.state();

            assert_eq!(
                state.owner,
                Some(me),
                "Condition::wait called without holding its mutex"
            );

            let depth = state.depth;
            state.owner = None;
            state.depth = 0;
            depth
        };
        inner.released.notify_all();

        let signalled = loop {
            if *generation != start {
                break true;
            }

            match deadline {
                None => {
                    generation = self
                        .signalled
                        .wait(generation)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break false;
                    }

                    generation = self
                        .signalled
                        .wait_timeout(generation, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        };
        drop(generation);

        drop(inner.claim(inner.state(), me, depth));

        signalled
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("mutex", &self.mutex)
            .finish_non_exhaustive()
    }
}
