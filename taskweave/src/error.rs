//! Error types.
//!
//! A task graph carries exactly one kind of failure between tasks:
//! [`TaskError`], an opaque and cheaply clonable wrapper around whatever the
//! failing payload produced. The same error value is handed to every
//! dependent of the failing task.
//!
//! [`Error`] is what the public API returns: awaiting a failed task yields
//! [`Error::Failed`] carrying the propagated [`TaskError`].

use crate::runtime::task::TaskId;

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Errors surfaced by the runtime API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The awaited task, or one of its upstream tasks, failed.
    #[error("task failed: {0}")]
    Failed(TaskError),

    /// The task was scheduled onto a runner that has been disposed.
    #[error("runner `{runner}` has been disposed")]
    Disposed { runner: String },

    /// No runner is installed for the calling thread.
    #[error("no runner is installed for the current thread")]
    NoRunner,

    /// The task completed successfully but holds no value.
    #[error("task {0} completed without a value")]
    MissingValue(TaskId),

    /// The parallel runner could not start a thread for a task.
    #[error("failed to spawn a task thread: {0}")]
    Spawn(#[from] io::Error),

    /// The task payload panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Returns the propagated task error if this is [`Error::Failed`].
    pub fn cause(&self) -> Option<&TaskError> {
        match self {
            Error::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// An opaque, shareable error produced by a task payload.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into it, so
/// payloads can use `?` directly. Cloning is cheap: all clones share the
/// same underlying error.
///
/// `TaskError` does not implement [`std::error::Error`] itself, which is
/// what makes the blanket `From` conversion possible.
#[derive(Clone)]
pub struct TaskError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl TaskError {
    /// Wraps an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Converts a panic payload caught while running a task.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };

        Self::new(Error::Panicked(message))
    }

    /// Returns the wrapped error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }

    /// Attempts to downcast the wrapped error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if both values share the same underlying error.
    pub fn ptr_eq(&self, other: &TaskError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> From<E> for TaskError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

/// Error built by [`TaskError::msg`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);
