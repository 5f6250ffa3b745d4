//! Runners and the task graph.
//!
//! A [`Runner`](runner::Runner) is a handle to a
//! [`Scheduler`](runner::Scheduler), the backend deciding where and when a
//! ready task runs. Tasks are built and chained through [`task`]. The
//! thread registry in [`context`] tracks which runner each thread considers
//! current.
//!
//! Most users only need [`Runner`](crate::Runner), [`Task`](crate::Task)
//! and [`schedule`](crate::schedule).

mod scheduler;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod runner;

pub mod task;
