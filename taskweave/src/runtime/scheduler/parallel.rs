use super::run_in_context;
use crate::error::Error;
use crate::runtime::runner::Scheduler;
use crate::runtime::task::TaskCore;
use crate::sync::SpinMutex;
use crate::utils::backoff::{Backoff, BackoffPolicy};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, trace};

/// A runner giving every task its own OS thread.
///
/// There is no pool and no bound on the number of threads. Awaiting polls
/// the task's completion flag according to the backoff policy, which by
/// default spins without ever blocking.
pub(crate) struct ParallelScheduler {
    name: String,

    /// Tasks accepted and not yet completed.
    ///
    /// Incremented on schedule and decremented together with publishing
    /// the task's completion, under the same lock, so a task seen as
    /// completed is never still counted.
    outstanding: SpinMutex<usize>,

    disposed: AtomicBool,
    backoff: BackoffPolicy,
    thread_name_prefix: String,
    stack_size: Option<usize>,
}

impl ParallelScheduler {
    pub(crate) fn new(
        name: String,
        backoff: BackoffPolicy,
        thread_name_prefix: String,
        stack_size: Option<usize>,
    ) -> Self {
        Self {
            name,
            outstanding: SpinMutex::new(0),
            disposed: AtomicBool::new(false),
            backoff,
            thread_name_prefix,
            stack_size,
        }
    }
}

impl Scheduler for ParallelScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, task: Arc<TaskCore>) -> Result<(), Error> {
        if self.is_disposed() {
            return Err(Error::Disposed {
                runner: self.name.clone(),
            });
        }

        self.outstanding.critical_section(|count| *count += 1);

        let mut builder = thread::Builder::new().name(format!(
            "{}-{}",
            self.thread_name_prefix,
            task.id().as_u64()
        ));

        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let id = task.id();
        let spawned = builder.spawn(move || run_in_context(&task));

        match spawned {
            Ok(_) => {
                trace!(task = %id, runner = %self.name, "spawned task thread");
                Ok(())
            }
            Err(error) => {
                self.outstanding.critical_section(|count| *count -= 1);
                Err(Error::Spawn(error))
            }
        }
    }

    fn await_task(&self, task: &Arc<TaskCore>) {
        let mut backoff = Backoff::new(self.backoff);

        while !task.is_completed() {
            backoff.snooze();
        }
    }

    fn mark_completed(&self, task: &TaskCore) {
        self.outstanding.critical_section(|count| {
            *count -= 1;
            task.publish_completed();
        });
    }

    /// Waits until no task of this runner is outstanding.
    fn run_until_idle(&self) {
        let mut backoff = Backoff::new(self.backoff);

        while self.scheduled_task_count() > 0 {
            backoff.snooze();
        }
    }

    fn scheduled_task_count(&self) -> usize {
        *self.outstanding.lock()
    }

    /// Stops accepting tasks. Threads already started run to completion.
    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }

        debug!(runner = %self.name, outstanding = self.scheduled_task_count(), "disposing runner");
        true
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
