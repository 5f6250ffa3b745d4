use crate::error::{Error, TaskError};
use crate::runtime::builder::{Flavor, RunnerBuilder};
use crate::runtime::task::{Task, TaskCore};

use std::fmt;
use std::ptr;
use std::sync::{Arc, OnceLock};

/// An execution backend for tasks.
///
/// A scheduler decides on which thread, and when, a queued task runs. It
/// never decides *whether* a task may run: a task only reaches
/// [`schedule`](Self::schedule) once all of its upstream tasks are done.
///
/// The runtime ships three implementations, selected through
/// [`RunnerBuilder::flavor`]. Custom backends implement this trait and are
/// wrapped with [`Runner::new`].
pub trait Scheduler: Send + Sync + 'static {
    /// Human-readable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Accepts a task for execution.
    ///
    /// The scheduler must eventually call [`TaskCore::run`] exactly once, on
    /// a thread of its choosing. Returning an error rejects the task; it
    /// then completes with that error without running.
    fn schedule(&self, task: Arc<TaskCore>) -> Result<(), Error>;

    /// Blocks the calling thread until `task` is completed.
    fn await_task(&self, task: &Arc<TaskCore>);

    /// Called by [`TaskCore::run`] once the task is finished and its
    /// dependents are released.
    ///
    /// Implementations doing bookkeeping must still end up calling
    /// [`TaskCore::publish_completed`].
    fn mark_completed(&self, task: &TaskCore) {
        task.publish_completed();
    }

    /// Runs at most one queued task on the calling thread.
    ///
    /// Returns `false` if nothing ran. Schedulers that run tasks on their
    /// own threads keep the default, which never runs anything.
    fn run_next(&self) -> bool {
        false
    }

    /// Blocks until this scheduler has no queued or running tasks left.
    fn run_until_idle(&self);

    /// Number of tasks accepted but not yet completed.
    fn scheduled_task_count(&self) -> usize;

    /// Stops accepting tasks. Returns `false` if already disposed.
    fn dispose(&self) -> bool;

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool;
}

/// A shared handle to a [`Scheduler`].
///
/// Runners compare equal when they are handles to the same scheduler
/// instance.
#[derive(Clone)]
pub struct Runner {
    scheduler: Arc<dyn Scheduler>,
}

impl Runner {
    /// Wraps a scheduler implementation.
    pub fn new<S: Scheduler>(scheduler: S) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
        }
    }

    /// Returns a builder to configure a runner.
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    /// Creates a cooperative runner bound to the calling thread.
    pub fn current_thread() -> Self {
        RunnerBuilder::new().flavor(Flavor::CurrentThread).build()
    }

    /// Creates a runner that gives every task its own OS thread.
    pub fn parallel() -> Self {
        RunnerBuilder::new().flavor(Flavor::Parallel).build()
    }

    /// Creates a runner that only runs tasks when explicitly driven.
    pub fn manual() -> Self {
        RunnerBuilder::new().flavor(Flavor::Manual).build()
    }

    /// Schedules `f` on this runner and returns a handle to its task.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let runner = Runner::current_thread();
    /// let total = runner
    ///     .schedule(|| Ok(1))
    ///     .then(|x| Ok(x + 1))
    ///     .wait_value()?;
    /// ```
    pub fn schedule<T, F>(&self, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        Task::spawn(self, None, f)
    }

    /// Like [`schedule`](Self::schedule), attaching a diagnostic label.
    pub fn schedule_named<T, F>(&self, label: impl Into<String>, f: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        Task::spawn(self, Some(label.into()), f)
    }

    /// Blocks until every task handed to this runner has completed.
    ///
    /// Cooperative runners run their queue on the calling thread; work
    /// released by a finished task joins the same loop.
    pub fn run_until_idle(&self) {
        self.scheduler.run_until_idle();
    }

    /// Runs the oldest queued task on the calling thread, if any.
    ///
    /// Only meaningful for cooperative runners; see [`Scheduler::run_next`].
    pub fn run_next(&self) -> bool {
        self.scheduler.run_next()
    }

    /// Number of tasks accepted but not yet completed.
    pub fn scheduled_task_count(&self) -> usize {
        self.scheduler.scheduled_task_count()
    }

    /// Stops the runner. Returns `false` if it was already disposed.
    pub fn dispose(&self) -> bool {
        self.scheduler.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.scheduler.is_disposed()
    }

    pub fn name(&self) -> &str {
        self.scheduler.name()
    }

    /// Returns the underlying scheduler.
    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.scheduler
    }

    /// Returns `true` if both handles refer to the same scheduler.
    pub fn ptr_eq(a: &Runner, b: &Runner) -> bool {
        ptr::addr_eq(Arc::as_ptr(&a.scheduler), Arc::as_ptr(&b.scheduler))
    }
}

impl PartialEq for Runner {
    fn eq(&self, other: &Self) -> bool {
        Runner::ptr_eq(self, other)
    }
}

impl Eq for Runner {}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.name())
            .field("scheduled", &self.scheduled_task_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// The runner a task is bound to, possibly not known yet.
///
/// A task produced by [`Task::then_async`] runs on whichever runner the
/// nested task turns out to use, which is only known once the continuation
/// has run. Such tasks hold a `Deferred` reference: a single-assignment slot
/// resolved later, plus the runner to drive while it is still empty.
#[derive(Clone)]
pub(crate) enum RunnerRef {
    Fixed(Runner),
    Deferred {
        slot: Arc<OnceLock<Runner>>,
        fallback: Box<RunnerRef>,
    },
}

impl RunnerRef {
    /// Creates an unresolved reference and returns the slot resolving it.
    pub(crate) fn deferred(fallback: RunnerRef) -> (Self, Arc<OnceLock<Runner>>) {
        let slot = Arc::new(OnceLock::new());

        let this = RunnerRef::Deferred {
            slot: slot.clone(),
            fallback: Box::new(fallback),
        };

        (this, slot)
    }

    /// The runner the task is bound to, if known.
    pub(crate) fn resolved(&self) -> Option<Runner> {
        match self {
            RunnerRef::Fixed(runner) => Some(runner.clone()),
            RunnerRef::Deferred { slot, .. } => slot.get().cloned(),
        }
    }

    /// The runner to drive while waiting for the task.
    ///
    /// This is the bound runner when known, otherwise the innermost fixed
    /// fallback.
    pub(crate) fn awaitable(&self) -> Runner {
        match self {
            RunnerRef::Fixed(runner) => runner.clone(),
            RunnerRef::Deferred { slot, fallback } => match slot.get() {
                Some(runner) => runner.clone(),
                None => fallback.awaitable(),
            },
        }
    }

    /// Returns `true` if the task is known to be bound to `runner`.
    pub(crate) fn is(&self, runner: &Runner) -> bool {
        self.resolved().is_some_and(|bound| bound == *runner)
    }
}

impl From<Runner> for RunnerRef {
    fn from(runner: Runner) -> Self {
        RunnerRef::Fixed(runner)
    }
}

impl From<&Runner> for RunnerRef {
    fn from(runner: &Runner) -> Self {
        RunnerRef::Fixed(runner.clone())
    }
}
