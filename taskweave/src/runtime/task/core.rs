use super::TaskId;
use super::state::{Phase, TaskState};
use crate::error::TaskError;
use crate::runtime::runner::{Runner, RunnerRef};
use crate::sync::SpinMutex;
use crate::utils::backoff::{Backoff, BackoffPolicy};

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{trace, warn};

/// Type-erased body of a task.
///
/// Receives the error propagated from upstream, if any, and decides what to
/// do with it: ordinary continuations forward it unchanged, error handlers
/// consume it. Whatever it returns becomes the task's outgoing error.
pub(crate) type Payload = Box<dyn FnOnce(Option<TaskError>) -> Result<(), TaskError> + Send>;

/// Called with the rejection error when a task completes without running.
pub(crate) type RejectHook = Box<dyn FnOnce(TaskError) + Send>;

/// A node of the task graph.
///
/// `TaskCore` is what schedulers see: it has no result type, only a
/// lifecycle, an error slot in each direction, the tasks it waits for, and
/// the continuations waiting for it. Typed access to results goes through
/// [`Task`](super::Task).
///
/// All mutable state lives behind the task's own [`SpinMutex`]; no lock is
/// shared between tasks.
pub struct TaskCore {
    id: TaskId,

    /// Optional diagnostic label.
    label: OnceLock<String>,

    /// Runner this task is scheduled on.
    runner: RunnerRef,

    state: SpinMutex<TaskState>,

    /// The body, taken out exactly once when the task runs.
    payload: SpinMutex<Option<Payload>>,

    /// Runs instead of the payload if the task is rejected.
    on_reject: SpinMutex<Option<RejectHook>>,

    /// Published completion flag.
    ///
    /// Set after the state says `Completed` *and* every paused dependent has
    /// been released, so a thread seeing `true` also sees the final outgoing
    /// error. Lets awaiters poll without taking the lock.
    completed: AtomicBool,
}

impl TaskCore {
    /// Creates a pending task.
    pub(crate) fn new(runner: RunnerRef, payload: Payload) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            label: OnceLock::new(),
            runner,
            state: SpinMutex::new(TaskState::new(Phase::Pending)),
            payload: SpinMutex::new(Some(payload)),
            on_reject: SpinMutex::new(None),
            completed: AtomicBool::new(false),
        })
    }

    /// Creates a task that is already completed successfully.
    pub(crate) fn finished(runner: RunnerRef) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            label: OnceLock::new(),
            runner,
            state: SpinMutex::new(TaskState::new(Phase::Completed)),
            payload: SpinMutex::new(None),
            on_reject: SpinMutex::new(None),
            completed: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.get().map(String::as_str)
    }

    /// Sets the label. Returns `false` if one was already set.
    pub(crate) fn set_label(&self, label: String) -> bool {
        self.label.set(label).is_ok()
    }

    /// The runner this task is bound to, if already known.
    pub fn runner(&self) -> Option<Runner> {
        self.runner.resolved()
    }

    pub(crate) fn runner_ref(&self) -> &RunnerRef {
        &self.runner
    }

    /// Returns `true` once the task has finished and released its
    /// dependents. Never reverts to `false`.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Number of continuations waiting for this task.
    pub fn paused_task_count(&self) -> usize {
        self.state.lock().paused.len()
    }

    /// Number of upstream tasks still referenced by this task.
    pub fn parent_count(&self) -> usize {
        self.state.lock().parents.len()
    }

    /// Makes completion visible to [`is_completed`](Self::is_completed).
    ///
    /// Called by [`Scheduler::mark_completed`](crate::Scheduler::mark_completed).
    /// Does not take the task lock, so schedulers may call it while holding
    /// their own.
    pub fn publish_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }

    pub(crate) fn add_parent(&self, parent: Arc<TaskCore>) {
        self.state.lock().parents.push(parent);
    }

    /// Records the error propagated from upstream.
    ///
    /// # Panics
    ///
    /// Panics if an incoming error was already recorded.
    pub(crate) fn set_incoming_error(&self, error: TaskError) {
        let mut state = self.state.lock();

        assert!(
            state.incoming_error.is_none(),
            "incoming error of task {} set twice",
            self.id
        );

        state.incoming_error = Some(error);
    }

    /// Installs the hook run by [`reject`](Self::reject).
    ///
    /// Must happen before the task can be scheduled.
    pub(crate) fn on_reject(&self, hook: RejectHook) {
        *self.on_reject.lock() = Some(hook);
    }

    pub(crate) fn outgoing_error(&self) -> Option<TaskError> {
        self.state.lock().outgoing_error.clone()
    }

    /// Hands this task to its runner.
    ///
    /// # Panics
    ///
    /// Panics if the task's runner is not resolved yet, or if the task was
    /// already scheduled.
    pub(crate) fn schedule(self: &Arc<Self>) {
        let Some(runner) = self.runner.resolved() else {
            panic!("task {} has no runner to be scheduled on", self.id);
        };

        {
            let mut state = self.state.lock();

            assert_eq!(
                state.phase,
                Phase::Pending,
                "task {} scheduled more than once",
                self.id
            );

            state.phase = Phase::Queued;
        }

        trace!(task = %self.id, runner = runner.name(), "scheduling task");

        if let Err(error) = runner.scheduler().schedule(self.clone()) {
            warn!(task = %self.id, runner = runner.name(), %error, "task rejected");
            self.reject(TaskError::new(error));
        }
    }

    /// Schedules `child` now if this task is completed, or parks it until
    /// this task completes.
    ///
    /// The check and the append happen under this task's lock, the same
    /// lock [`finish`](Self::finish) holds while marking completion and
    /// taking the parked continuations, so a continuation is never parked on
    /// a task that has already drained.
    pub(crate) fn schedule_or_enqueue(&self, child: Arc<TaskCore>) {
        let error = {
            let mut state = self.state.lock();

            if !state.is_completed() {
                state.paused.push_back(child);
                return;
            }

            state.outgoing_error.clone()
        };

        release(&child, error);
    }

    /// Runs the task and releases its dependents.
    ///
    /// Schedulers call this exactly once per task. It waits for every
    /// parent, runs the payload (a panic counts as a failure), marks the task
    /// completed, schedules each parked continuation in FIFO order with this
    /// task's error, then reports completion to the runner.
    ///
    /// # Panics
    ///
    /// Panics if the task is not in the `Queued` phase.
    pub fn run(self: &Arc<Self>) {
        let parents = self.state.lock().parents.clone();

        // A parent has finished by now but may not have published yet. Its
        // failure already reached the incoming error. Its runner is not
        // driven from here, so none of that runner's tasks run on this thread.
        for parent in &parents {
            let mut backoff = Backoff::new(BackoffPolicy::default());

            while !parent.is_completed() {
                backoff.snooze();
            }
        }

        let (payload, incoming) = {
            let mut state = self.state.lock();

            assert_eq!(
                state.phase,
                Phase::Queued,
                "task {} run while not queued",
                self.id
            );

            state.phase = Phase::Running;
            self.on_reject.lock().take();

            (self.payload.lock().take(), state.incoming_error.clone())
        };

        trace!(task = %self.id, failed_upstream = incoming.is_some(), "running task");

        let outcome = match payload {
            Some(payload) => panic::catch_unwind(AssertUnwindSafe(|| payload(incoming)))
                .unwrap_or_else(|panic| Err(TaskError::from_panic(panic))),
            None => Ok(()),
        };

        self.finish(outcome.err());

        match self.runner.resolved() {
            Some(runner) => runner.scheduler().mark_completed(self),
            None => self.publish_completed(),
        }
    }

    /// Completes the task with `error` without running its payload.
    ///
    /// The reject hook, if any, runs last with the same error.
    pub(crate) fn reject(&self, error: TaskError) {
        self.payload.lock().take();
        let hook = self.on_reject.lock().take();

        self.finish(Some(error.clone()));
        self.publish_completed();

        if let Some(hook) = hook {
            hook(error);
        }
    }

    /// Blocks until the task completes and returns its outgoing error.
    ///
    /// Parents are awaited first, and their failures ignored: a failing
    /// parent has already forwarded its error into this task.
    ///
    /// While the task's runner is still unresolved, the fallback runner is
    /// driven one task at a time and the runner looked up again after each
    /// step, since the task may end up on a runner only this thread drives.
    pub(crate) fn wait(self: &Arc<Self>) -> Result<(), TaskError> {
        if !self.is_completed() {
            let parents = self.state.lock().parents.clone();

            for parent in &parents {
                let _ = parent.wait();
            }

            let mut backoff = Backoff::new(BackoffPolicy::default());

            while !self.is_completed() {
                if let Some(runner) = self.runner.resolved() {
                    runner.scheduler().await_task(self);
                    break;
                }

                if !self.runner.awaitable().run_next() {
                    backoff.snooze();
                }
            }
        }

        match self.outgoing_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Marks the task completed and releases its parked continuations in
    /// FIFO order.
    ///
    /// The phase, the outgoing error and the parked list change in one
    /// critical section: a concurrent `schedule_or_enqueue` either parked its
    /// child before it, and the child is released here, or sees `Completed`
    /// after it and releases the child itself. Scheduling happens outside the
    /// lock, since it may spawn a thread, but before the caller publishes
    /// completion.
    fn finish(&self, error: Option<TaskError>) {
        let paused = {
            let mut state = self.state.lock();

            state.outgoing_error = error.clone();
            state.phase = Phase::Completed;
            state.parents.clear();

            mem::take(&mut state.paused)
        };

        for child in &paused {
            release(child, error.clone());
        }
    }
}

/// Hands `child` the error of the task it waited for, then schedules it.
fn release(child: &Arc<TaskCore>, error: Option<TaskError>) {
    if let Some(error) = error {
        child.set_incoming_error(error);
    }

    child.schedule();
}

impl fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}
