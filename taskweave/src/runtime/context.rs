//! Per-thread runner registry.
//!
//! Every thread may have one runner installed as its *current* runner. The
//! free function [`schedule`] targets it, and schedulers install a task's
//! runner on the thread running the task, so work scheduled from inside a
//! task lands on the same runner by default.
//!
//! The registry is a process-wide map keyed by [`ThreadId`], so any thread
//! can inspect it, but each thread only ever reads and writes its own entry.

use crate::error::{Error, TaskError};
use crate::runtime::runner::Runner;
use crate::runtime::task::Task;

use std::marker::PhantomData;
use std::sync::LazyLock;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

static RUNNERS: LazyLock<DashMap<ThreadId, Runner>> = LazyLock::new(DashMap::new);

/// Returns the runner installed for the calling thread.
pub fn async_runner() -> Option<Runner> {
    RUNNERS
        .get(&thread::current().id())
        .map(|entry| entry.value().clone())
}

/// Installs `runner` as the calling thread's runner, or clears it with
/// `None`. Returns the previously installed runner.
pub fn set_async_runner(runner: Option<Runner>) -> Option<Runner> {
    let id = thread::current().id();

    match runner {
        Some(runner) => RUNNERS.insert(id, runner),
        None => RUNNERS.remove(&id).map(|(_, runner)| runner),
    }
}

/// Restores the previously installed runner when dropped.
///
/// Returned by [`enter`]. Bound to the thread that created it.
#[must_use = "the runner is uninstalled as soon as the guard is dropped"]
pub struct RunnerGuard {
    previous: Option<Runner>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RunnerGuard {
    fn drop(&mut self) {
        set_async_runner(self.previous.take());
    }
}

/// Installs `runner` for the calling thread until the guard is dropped.
pub fn enter(runner: &Runner) -> RunnerGuard {
    RunnerGuard {
        previous: set_async_runner(Some(runner.clone())),
        _not_send: PhantomData,
    }
}

/// Runs `f` with `runner` installed for the calling thread.
///
/// The previous runner is restored afterwards, even if `f` panics.
///
/// # Examples
///
/// ```rust,ignore
/// let runner = Runner::current_thread();
///
/// let task = with_async_scheduler(&runner, || taskweave::schedule(|| Ok(7)));
/// assert_eq!(task.wait_value()?, 7);
/// ```
pub fn with_async_scheduler<R>(runner: &Runner, f: impl FnOnce() -> R) -> R {
    let _guard = enter(runner);
    f()
}

/// Schedules `f` on the calling thread's runner.
///
/// # Panics
///
/// Panics if no runner is installed; see [`try_schedule`].
pub fn schedule<T, F>(f: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
{
    async_runner()
        .expect("schedule must be called within the context of a runner")
        .schedule(f)
}

/// Like [`schedule`], returning [`Error::NoRunner`] instead of panicking.
pub fn try_schedule<T, F>(f: F) -> Result<Task<T>, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
{
    let runner = async_runner().ok_or(Error::NoRunner)?;
    Ok(runner.schedule(f))
}
