//! Task graph primitives.
//!
//! This module defines the nodes of the task graph and the handles used to
//! build it.
//!
//! It includes:
//! - [`TaskCore`], the type-erased node schedulers run,
//! - [`Task`], the typed handle carrying a result and the chaining
//!   combinators,
//! - the lifecycle [`Phase`] and the [`TaskId`] used in diagnostics,
//! - the glue behind the `*_async` combinators, which adopt the outcome of a
//!   task started by a continuation.
//!
//! Most users create tasks through [`Runner::schedule`](crate::Runner::schedule)
//! or [`schedule`](crate::schedule) and chain them with [`Task::then`] and
//! friends; schedulers only ever deal with [`TaskCore`].

mod continuation;
mod core;
mod handle;
mod id;
mod state;

pub use self::core::TaskCore;
pub use handle::{AsyncAction, AsyncFunction, Task};
pub use id::TaskId;
pub use state::Phase;
