use super::runner::Runner;
use super::scheduler::current_thread::CurrentThreadScheduler;
use super::scheduler::manual::ManualScheduler;
use super::scheduler::parallel::ParallelScheduler;
use crate::utils::backoff::BackoffPolicy;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The scheduling strategy of a runner built by [`RunnerBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Tasks run one at a time on the thread that built the runner, when
    /// that thread waits or calls [`Runner::run_until_idle`].
    #[default]
    CurrentThread,

    /// Every task runs on a dedicated, newly spawned OS thread.
    Parallel,

    /// Tasks run only when some thread drives the runner, from any thread.
    Manual,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flavor::CurrentThread => "current-thread",
            Flavor::Parallel => "parallel",
            Flavor::Manual => "manual",
        })
    }
}

/// Builder for configuring and creating a runner.
///
/// # Examples
///
/// ```rust,ignore
/// let runner = RunnerBuilder::new()
///     .flavor(Flavor::Parallel)
///     .thread_name_prefix("io")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct RunnerBuilder {
    flavor: Flavor,
    name: Option<String>,
    backoff: BackoffPolicy,

    /// Prefix of the threads spawned by a parallel runner.
    thread_name_prefix: String,

    /// Stack size of the threads spawned by a parallel runner.
    stack_size: Option<usize>,
}

impl RunnerBuilder {
    /// Creates a builder for a current-thread runner that spins while
    /// waiting.
    pub fn new() -> Self {
        Self {
            flavor: Flavor::default(),
            name: None,
            backoff: BackoffPolicy::default(),
            thread_name_prefix: String::from("taskweave"),
            stack_size: None,
        }
    }

    pub fn flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Sets the name used in diagnostics and disposal errors.
    ///
    /// Defaults to the flavor followed by a process-wide counter, such as
    /// `parallel-3`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets how waiting threads poll for completion.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the prefix of task thread names; each thread is named
    /// `<prefix>-<task id>`. Only used by parallel runners.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the stack size of task threads. Only used by parallel runners.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size > 0, "stack_size must be > 0");

        self.stack_size = Some(size);
        self
    }

    /// Builds the runner with the configured options.
    ///
    /// A current-thread runner is bound to the calling thread.
    pub fn build(self) -> Runner {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", self.flavor, NEXT.fetch_add(1, Ordering::Relaxed)));

        match self.flavor {
            Flavor::CurrentThread => Runner::new(CurrentThreadScheduler::new(name, self.backoff)),
            Flavor::Manual => Runner::new(ManualScheduler::new(name, self.backoff)),
            Flavor::Parallel => Runner::new(ParallelScheduler::new(
                name,
                self.backoff,
                self.thread_name_prefix,
                self.stack_size,
            )),
        }
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
