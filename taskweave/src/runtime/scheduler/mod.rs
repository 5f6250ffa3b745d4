//! Scheduler implementations.
//!
//! Three interchangeable backends implement [`Scheduler`](crate::Scheduler):
//!
//! - [`manual`]: a FIFO run queue drained only when someone drives it,
//!   from any thread.
//! - [`current_thread`]: the same queue, drained only by the thread that
//!   created the runner. Cooperative and deterministic.
//! - [`parallel`]: one new OS thread per scheduled task, no pooling.
//!
//! [`queue`] holds the run queue shared by the two cooperative backends.

pub(crate) mod current_thread;
pub(crate) mod manual;
pub(crate) mod parallel;
pub(crate) mod queue;

use crate::runtime::context::with_async_scheduler;
use crate::runtime::task::TaskCore;

use std::sync::Arc;

/// Runs `task` with its runner installed as the current thread's runner.
///
/// Tasks scheduled through [`schedule`](crate::schedule) from inside the
/// payload thereby land on the runner executing it.
pub(crate) fn run_in_context(task: &Arc<TaskCore>) {
    match task.runner() {
        Some(runner) => with_async_scheduler(&runner, || task.run()),
        None => task.run(),
    }
}
