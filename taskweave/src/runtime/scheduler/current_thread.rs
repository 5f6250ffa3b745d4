use super::manual::ManualScheduler;
use crate::error::Error;
use crate::runtime::runner::Scheduler;
use crate::runtime::task::TaskCore;
use crate::utils::backoff::{Backoff, BackoffPolicy};

use std::sync::Arc;
use std::thread::{self, ThreadId};

/// A cooperative runner bound to the thread that created it.
///
/// Any thread may schedule onto it, but only the owning thread runs its
/// queue, strictly in FIFO order. Other threads waiting for one of its tasks
/// back off until the owner gets to it.
pub(crate) struct CurrentThreadScheduler {
    inner: ManualScheduler,
    owner: ThreadId,
    backoff: BackoffPolicy,
}

impl CurrentThreadScheduler {
    pub(crate) fn new(name: String, backoff: BackoffPolicy) -> Self {
        Self {
            inner: ManualScheduler::new(name, backoff),
            owner: thread::current().id(),
            backoff,
        }
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn assert_owner(&self, operation: &str) {
        assert!(
            self.on_owner_thread(),
            "{operation} on current-thread runner `{}` called from a thread that does not own it",
            self.inner.name()
        );
    }
}

impl Scheduler for CurrentThreadScheduler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn schedule(&self, task: Arc<TaskCore>) -> Result<(), Error> {
        self.inner.schedule(task)
    }

    fn await_task(&self, task: &Arc<TaskCore>) {
        if self.on_owner_thread() {
            self.inner.await_task(task);
            return;
        }

        let mut backoff = Backoff::new(self.backoff);
        while !task.is_completed() {
            backoff.snooze();
        }
    }

    /// Runs nothing, and returns `false`, when called from a thread other
    /// than the owner.
    fn run_next(&self) -> bool {
        self.on_owner_thread() && self.inner.run_next()
    }

    /// # Panics
    ///
    /// Panics when called from a thread other than the owner.
    fn run_until_idle(&self) {
        self.assert_owner("run_until_idle");
        self.inner.run_until_idle();
    }

    fn scheduled_task_count(&self) -> usize {
        self.inner.scheduled_task_count()
    }

    fn dispose(&self) -> bool {
        self.inner.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}
