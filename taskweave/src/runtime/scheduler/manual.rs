use super::queue::RunQueue;
use super::run_in_context;
use crate::error::{Error, TaskError};
use crate::runtime::runner::Scheduler;
use crate::runtime::task::TaskCore;
use crate::utils::backoff::{Backoff, BackoffPolicy};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, trace};

/// A runner that only makes progress when driven.
///
/// Scheduling appends to a FIFO queue. Tasks run on whichever thread calls
/// [`run_next`](Scheduler::run_next),
/// [`run_until_idle`](Scheduler::run_until_idle) or
/// [`await_task`](Scheduler::await_task), one at a time, in queue order. A
/// finished task's continuations join the back of the same queue.
pub(crate) struct ManualScheduler {
    name: String,
    queue: RunQueue,

    /// Tasks popped from the queue and currently running.
    running: AtomicUsize,

    disposed: AtomicBool,
    backoff: BackoffPolicy,
}

impl ManualScheduler {
    pub(crate) fn new(name: String, backoff: BackoffPolicy) -> Self {
        Self {
            name,
            queue: RunQueue::new(),
            running: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            backoff,
        }
    }

    /// Completes every queued task with a disposal error.
    fn reject_queued(&self) {
        for task in self.queue.take_all() {
            trace!(task = %task.id(), runner = %self.name, "rejecting queued task");
            task.reject(self.disposed_error());
        }
    }

    fn disposed_error(&self) -> TaskError {
        TaskError::new(Error::Disposed {
            runner: self.name.clone(),
        })
    }
}

impl Scheduler for ManualScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, task: Arc<TaskCore>) -> Result<(), Error> {
        if self.is_disposed() {
            return Err(Error::Disposed {
                runner: self.name.clone(),
            });
        }

        self.queue.push(task);

        // Lost a race with `dispose`, which may have drained the queue
        // before the push.
        if self.is_disposed() {
            self.reject_queued();
        }

        Ok(())
    }

    /// Runs queued tasks until `task` is completed.
    ///
    /// When the queue runs dry first, the task is completing on another
    /// runner; the loop backs off until it shows up as completed or new
    /// work arrives.
    fn await_task(&self, task: &Arc<TaskCore>) {
        let mut backoff = Backoff::new(self.backoff);

        while !task.is_completed() {
            if !self.run_next() {
                backoff.snooze();
            }
        }

        if backoff.snoozes() > 0 {
            trace!(task = %task.id(), snoozes = backoff.snoozes(), "awaited task completed elsewhere");
        }
    }

    fn run_next(&self) -> bool {
        let Some(task) = self.queue.pop() else {
            return false;
        };

        self.running.fetch_add(1, Ordering::AcqRel);
        run_in_context(&task);
        self.running.fetch_sub(1, Ordering::AcqRel);

        true
    }

    /// Drains the queue, including work released while draining.
    fn run_until_idle(&self) {
        while self.run_next() {}
    }

    fn scheduled_task_count(&self) -> usize {
        self.queue.len() + self.running.load(Ordering::Acquire)
    }

    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }

        debug!(runner = %self.name, queued = self.queue.len(), "disposing runner");
        self.reject_queued();

        true
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
