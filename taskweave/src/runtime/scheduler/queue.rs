use crate::runtime::task::TaskCore;
use crate::sync::SpinMutex;

use std::collections::VecDeque;
use std::sync::Arc;

/// A FIFO queue of tasks waiting to run.
///
/// Any thread may push; tasks are popped from the front so they run in the
/// order they were scheduled.
pub(crate) struct RunQueue {
    inner: SpinMutex<VecDeque<Arc<TaskCore>>>,
}

impl RunQueue {
    /// Creates an empty run queue.
    pub(crate) fn new() -> Self {
        Self {
            inner: SpinMutex::new(VecDeque::new()),
        }
    }

    /// Appends a task to the back of the queue.
    pub(crate) fn push(&self, task: Arc<TaskCore>) {
        self.inner.lock().push_back(task);
    }

    /// Removes the oldest task.
    ///
    /// Returns `None` if the queue is empty.
    pub(crate) fn pop(&self) -> Option<Arc<TaskCore>> {
        self.inner.lock().pop_front()
    }

    /// Removes every queued task, oldest first.
    pub(crate) fn take_all(&self) -> Vec<Arc<TaskCore>> {
        self.inner.lock().drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
