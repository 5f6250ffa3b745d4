use super::TaskCore;
use crate::error::TaskError;

use std::collections::VecDeque;
use std::sync::Arc;

/// Lifecycle of a task.
///
/// Transitions only move forward:
/// `Pending -> Queued -> Running -> Completed`. A task rejected by a
/// disposed runner jumps straight from `Pending` or `Queued` to `Completed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Created, waiting for its upstream task or for an explicit schedule.
    Pending,

    /// Handed to a runner, waiting to be picked up.
    Queued,

    /// The payload is executing.
    Running,

    /// Finished, successfully or not. Terminal.
    Completed,
}

/// Mutable state of a task, guarded by the task's own mutex.
pub(crate) struct TaskState {
    pub(crate) phase: Phase,

    /// Error received from upstream. Set at most once.
    pub(crate) incoming_error: Option<TaskError>,

    /// Error produced by this task for its dependents.
    pub(crate) outgoing_error: Option<TaskError>,

    /// Tasks that must complete before this one runs.
    ///
    /// Cleared on completion, which keeps a finished graph from pinning its
    /// upstream tasks in memory.
    pub(crate) parents: Vec<Arc<TaskCore>>,

    /// Continuations registered while this task was incomplete, released in
    /// FIFO order on completion.
    pub(crate) paused: VecDeque<Arc<TaskCore>>,
}

impl TaskState {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            incoming_error: None,
            outgoing_error: None,
            parents: Vec::new(),
            paused: VecDeque::new(),
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }
}
