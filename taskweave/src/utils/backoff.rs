use std::hint;
use std::thread;
use std::time::Duration;

/// How a busy-polling loop waits between two checks of its condition.
///
/// Every blocking operation of the runtime (awaiting a task, draining an
/// empty queue while the awaited task completes elsewhere, waiting for a
/// parallel runner to go idle) is a polling loop. The policy only changes how
/// aggressively the loop burns CPU; it never changes what the loop waits for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Re-check immediately, with a CPU spin hint. No system call.
    #[default]
    Spin,

    /// Give the rest of the time slice back to the OS scheduler.
    Yield,

    /// Sleep for a fixed duration between checks.
    Sleep(Duration),
}

/// Stateful waiter driven by a [`BackoffPolicy`].
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    snoozes: u64,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self { policy, snoozes: 0 }
    }

    /// Waits once according to the policy.
    pub(crate) fn snooze(&mut self) {
        self.snoozes = self.snoozes.wrapping_add(1);

        match self.policy {
            BackoffPolicy::Spin => hint::spin_loop(),
            BackoffPolicy::Yield => yield_thread(),
            BackoffPolicy::Sleep(duration) => thread::sleep(duration),
        }
    }

    /// Number of times [`snooze`](Self::snooze) has been called.
    pub(crate) fn snoozes(&self) -> u64 {
        self.snoozes
    }
}

#[cfg(unix)]
fn yield_thread() {
    // sched_yield cannot fail on Linux and the BSDs.
    unsafe {
        libc::sched_yield();
    }
}

#[cfg(windows)]
fn yield_thread() {
    // Returns zero when no other thread was ready, which is fine here.
    unsafe {
        windows_sys::Win32::System::Threading::SwitchToThread();
    }
}

#[cfg(not(any(unix, windows)))]
fn yield_thread() {
    thread::yield_now();
}
