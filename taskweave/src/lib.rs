//! # Taskweave
//!
//! **Taskweave** is a small runtime for graphs of dependent tasks, built on
//! plain OS threads and busy-polling rather than futures or an event loop.
//!
//! A task is a closure scheduled on a [`Runner`]. Chaining combinators such
//! as [`Task::then`] or [`Task::catch_error`] attach continuations that run
//! once the task completes, possibly on another runner. Errors flow down the
//! chain, skipping ordinary continuations until an error handler consumes
//! them.
//!
//! Three runner flavors are provided:
//!
//! - **current-thread**: a cooperative FIFO queue run by the thread that
//!   created it, whenever that thread waits
//! - **parallel**: one dedicated OS thread per task
//! - **manual**: a FIFO queue only run when explicitly driven
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taskweave::Runner;
//!
//! let runner = Runner::current_thread();
//!
//! let total = runner
//!     .schedule(|| Ok(1))
//!     .then(|x| Ok(x + 1))
//!     .then(|x| Ok(x + 1))
//!     .wait_value()?;
//!
//! assert_eq!(total, 3);
//! ```
//!
//! ## Modules
//!
//! - [`task`] — Task handles and the graph node
//! - [`sync`] — Spin and reentrant mutexes used by the runtime
//! - [`error`] — Error types

mod runtime;
mod utils;

pub mod error;
pub mod sync;

pub use error::{Error, TaskError};
pub use runtime::builder::{Flavor, RunnerBuilder};
pub use runtime::context::{
    RunnerGuard, async_runner, enter, schedule, set_async_runner, try_schedule,
    with_async_scheduler,
};
pub use runtime::runner::{Runner, Scheduler};
pub use runtime::task::{self, AsyncAction, AsyncFunction, Phase, Task, TaskCore, TaskId};
pub use utils::BackoffPolicy;

pub use taskweave_macros::*;
