use super::{TaskCore, TaskId, continuation};
use crate::error::{Error, TaskError};
use crate::runtime::runner::{Runner, RunnerRef};
use crate::sync::SpinMutex;

use std::fmt;
use std::sync::Arc;

/// A task producing no value.
pub type AsyncAction = Task<()>;

/// A task producing a value of type `T`.
pub type AsyncFunction<T> = Task<T>;

/// Shared slot a task stores its result in.
pub(crate) type ValueSlot<T> = Arc<SpinMutex<Option<T>>>;

/// A handle to a task of the graph, producing a `T` on success.
///
/// Handles are cheap to clone; clones refer to the same task. Dropping a
/// handle never cancels anything: a task runs once its upstream completes
/// whether or not anyone still holds a handle to it.
///
/// Chaining methods (`then`, `catch_error`, ...) register a continuation
/// and return a handle to it immediately, without blocking. Only
/// [`wait`](Self::wait) and [`wait_value`](Self::wait_value) block.
pub struct Task<T> {
    core: Arc<TaskCore>,
    value: ValueSlot<T>,
}

/// What a continuation receives from the task it was attached to.
pub(crate) struct Upstream<T> {
    /// Error propagated into the continuation, if the upstream failed.
    pub(crate) error: Option<TaskError>,
    id: TaskId,
    value: ValueSlot<T>,
}

impl<T: Clone> Upstream<T> {
    /// The upstream value, or the propagated error.
    pub(crate) fn into_result(self) -> Result<T, TaskError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        self.value
            .lock()
            .clone()
            .ok_or_else(|| TaskError::new(Error::MissingValue(self.id)))
    }
}

impl<T: Send + 'static> Task<T> {
    /// Creates a root task on `runner` and schedules it.
    pub(crate) fn spawn<F>(runner: &Runner, label: Option<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    {
        let value: ValueSlot<T> = Arc::new(SpinMutex::new(None));
        let slot = value.clone();

        let core = TaskCore::new(
            runner.into(),
            Box::new(move |incoming: Option<TaskError>| {
                if let Some(error) = incoming {
                    return Err(error);
                }

                let out = f()?;
                *slot.lock() = Some(out);
                Ok(())
            }),
        );

        if let Some(label) = label {
            core.set_label(label);
        }

        core.schedule();

        Task { core, value }
    }

    /// Returns a task bound to `runner` that is already completed with
    /// `value`.
    pub fn ready(runner: &Runner, value: T) -> Self {
        Task {
            core: TaskCore::finished(runner.into()),
            value: Arc::new(SpinMutex::new(Some(value))),
        }
    }

    pub(crate) fn from_parts(core: Arc<TaskCore>, value: ValueSlot<T>) -> Self {
        Task { core, value }
    }

    /// Builds a continuation of this task without registering it.
    ///
    /// `body` runs on `runner` once this task completes and receives its
    /// error or value. It alone decides whether an upstream error
    /// short-circuits or is handled.
    pub(crate) fn derive<U, F>(&self, runner: RunnerRef, body: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(Upstream<T>) -> Result<U, TaskError> + Send + 'static,
    {
        let id = self.core.id();
        let upstream = self.value.clone();
        let value: ValueSlot<U> = Arc::new(SpinMutex::new(None));
        let slot = value.clone();

        let core = TaskCore::new(
            runner,
            Box::new(move |incoming: Option<TaskError>| {
                let out = body(Upstream {
                    error: incoming,
                    id,
                    value: upstream,
                })?;

                *slot.lock() = Some(out);
                Ok(())
            }),
        );

        core.add_parent(self.core.clone());

        Task { core, value }
    }

    /// Builds a continuation and registers it on this task.
    ///
    /// Every combinator funnels through here.
    pub(crate) fn continue_with<U, F>(&self, runner: RunnerRef, body: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(Upstream<T>) -> Result<U, TaskError> + Send + 'static,
    {
        let child = self.derive(runner, body);
        self.core.schedule_or_enqueue(child.core.clone());

        child
    }

    /// Runs `f` with this task's value once it completes, on the same
    /// runner.
    ///
    /// If this task fails, `f` is skipped and the error propagates to the
    /// returned task.
    pub fn then<U, F>(&self, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, TaskError> + Send + 'static,
    {
        self.continue_with(self.core.runner_ref().clone(), move |upstream| {
            f(upstream.into_result()?)
        })
    }

    /// Like [`then`](Self::then), running `f` on `runner` instead.
    ///
    /// Completion of this task triggers the continuation wherever this task
    /// ran, but the continuation itself is scheduled on `runner`.
    pub fn then_on<U, F>(&self, runner: &Runner, f: F) -> Task<U>
    where
        T: Clone,
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, TaskError> + Send + 'static,
    {
        self.continue_with(runner.into(), move |upstream| f(upstream.into_result()?))
    }

    /// Returns a task completing like this one, but on `runner`.
    ///
    /// When this task is already bound to `runner`, returns a handle to this
    /// very task; no continuation is created.
    pub fn switch_to(&self, runner: &Runner) -> Task<T>
    where
        T: Clone,
    {
        if self.core.runner_ref().is(runner) {
            return self.clone();
        }

        self.continue_with(runner.into(), Upstream::into_result)
    }

    /// Runs `handler` if this task fails, on the same runner.
    ///
    /// The handler consumes the error: the returned task succeeds with the
    /// handler's value unless the handler itself fails. If this task
    /// succeeds, the handler is skipped and the returned task completes with
    /// `U::default()`; the upstream value is not passed through.
    pub fn catch_error<U, F>(&self, handler: F) -> Task<U>
    where
        U: Default + Send + 'static,
        F: FnOnce(TaskError) -> Result<U, TaskError> + Send + 'static,
    {
        self.catch_error_on_ref(self.core.runner_ref().clone(), handler)
    }

    /// Like [`catch_error`](Self::catch_error), running `handler` on `runner`.
    pub fn catch_error_on<U, F>(&self, runner: &Runner, handler: F) -> Task<U>
    where
        U: Default + Send + 'static,
        F: FnOnce(TaskError) -> Result<U, TaskError> + Send + 'static,
    {
        self.catch_error_on_ref(runner.into(), handler)
    }

    fn catch_error_on_ref<U, F>(&self, runner: RunnerRef, handler: F) -> Task<U>
    where
        U: Default + Send + 'static,
        F: FnOnce(TaskError) -> Result<U, TaskError> + Send + 'static,
    {
        self.continue_with(runner, move |upstream| match upstream.error {
            Some(error) => handler(error),
            None => Ok(U::default()),
        })
    }

    /// Runs `f`, which starts another task, and completes with that task's
    /// outcome.
    ///
    /// `f` runs on this task's runner. The returned task is bound to the
    /// runner of the task `f` produces, which is unknown until `f` has run.
    pub fn then_async<U, F>(&self, f: F) -> Task<U>
    where
        T: Clone,
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Task<U>, TaskError> + Send + 'static,
    {
        continuation::flatten(self, self.core.runner_ref().clone(), move |upstream| {
            f(upstream.into_result()?)
        })
    }

    /// Like [`then_async`](Self::then_async), running `f` on `runner`.
    pub fn then_async_on<U, F>(&self, runner: &Runner, f: F) -> Task<U>
    where
        T: Clone,
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<Task<U>, TaskError> + Send + 'static,
    {
        continuation::flatten(self, runner.into(), move |upstream| {
            f(upstream.into_result()?)
        })
    }

    /// Runs `handler`, which starts another task, if this task fails.
    ///
    /// The returned task completes with the outcome of the task `handler`
    /// produced, or with `U::default()` if this task succeeded.
    pub fn catch_error_async<U, F>(&self, handler: F) -> Task<U>
    where
        U: Default + Clone + Send + 'static,
        F: FnOnce(TaskError) -> Result<Task<U>, TaskError> + Send + 'static,
    {
        let runner = self.core.runner_ref().clone();
        let fallback = runner.clone();

        continuation::flatten(self, runner, move |upstream| match upstream.error {
            Some(error) => handler(error),
            None => Ok(Task::ready(&fallback.awaitable(), U::default())),
        })
    }

    /// Blocks until the task completes.
    ///
    /// Returns [`Error::Failed`] with the first error propagated along the
    /// chain if this task, or a task upstream of it, failed.
    pub fn wait(&self) -> Result<(), Error> {
        self.core.wait().map_err(Error::Failed)
    }

    /// Blocks until the task completes and returns its value.
    pub fn wait_value(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        self.wait()?;

        self.value
            .lock()
            .clone()
            .ok_or(Error::MissingValue(self.core.id()))
    }

    /// Attaches a diagnostic label. Has no effect if one is already set.
    pub fn named(self, label: impl Into<String>) -> Self {
        self.core.set_label(label.into());
        self
    }
}

impl<T> Task<T> {
    pub fn id(&self) -> TaskId {
        self.core.id()
    }

    pub fn label(&self) -> Option<&str> {
        self.core.label()
    }

    /// The runner the task is bound to, if already known.
    pub fn runner(&self) -> Option<Runner> {
        self.core.runner()
    }

    pub fn is_completed(&self) -> bool {
        self.core.is_completed()
    }

    /// Number of continuations waiting for this task to complete.
    pub fn paused_task_count(&self) -> usize {
        self.core.paused_task_count()
    }

    /// Returns the type-erased task node.
    pub fn core(&self) -> &Arc<TaskCore> {
        &self.core
    }

    /// Returns `true` if both handles refer to the same task.
    pub fn ptr_eq(a: &Task<T>, b: &Task<T>) -> bool {
        Arc::ptr_eq(&a.core, &b.core)
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Task {
            core: self.core.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        Task::ptr_eq(self, other)
    }
}

impl<T> Eq for Task<T> {}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.core.id())
            .field("label", &self.core.label())
            .field("completed", &self.core.is_completed())
            .finish()
    }
}
