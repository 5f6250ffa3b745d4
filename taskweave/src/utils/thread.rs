use std::sync::atomic::{AtomicU64, Ordering};

/// Owner word meaning "no thread".
pub(crate) const UNOWNED: u64 = 0;

/// Next token to hand out. Starts at 1 so that no thread ever gets
/// [`UNOWNED`].
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Returns a process-unique, non-zero identifier for the calling thread.
///
/// `std::thread::ThreadId` cannot be stored in an atomic, so mutex owner
/// fields use this token instead. Tokens are never reused.
pub(crate) fn current_token() -> u64 {
    TOKEN.with(|token| *token)
}
