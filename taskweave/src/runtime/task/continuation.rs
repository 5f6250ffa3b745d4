//! Continuations that start another task and adopt its outcome.
//!
//! `a.then_async(f)` cannot be an ordinary continuation: the task `f`
//! returns may run on any runner and completes at some later point, and
//! the handle returned to the caller must complete only then. The wiring:
//!
//! ```text
//!   a ──► inner (runs f, yields nested) ──► glue ──► forward ──► result
//!                                             │        ▲
//!                                             └─ nested┘
//! ```
//!
//! - `result` is created up front with `a` as parent and a deferred runner.
//!   It is never parked on anything; it is scheduled explicitly.
//! - `glue` runs after `inner`. If `inner` failed, it resolves `result`'s
//!   runner to the requested one, hands it the error and schedules it.
//!   Otherwise it attaches `forward` to `nested` and makes it a parent of
//!   `result`.
//! - `forward` runs on `nested`'s runner once `nested` completes, copies its
//!   value or error into `result`, binds `result` to that runner and
//!   schedules it there.
//!
//! If a disposed runner rejects `glue` or `forward`, their payload never
//! runs; a reject hook completes `result` with the rejection error instead.

use super::core::RejectHook;
use super::handle::{Task, Upstream, ValueSlot};
use super::TaskCore;
use crate::error::TaskError;
use crate::runtime::runner::{Runner, RunnerRef};
use crate::sync::SpinMutex;

use std::sync::{Arc, OnceLock};

/// Builds the task returned by the `*_async` combinators.
///
/// `produce` runs on `runner` once `upstream` completes, receives its
/// outcome and returns the nested task whose outcome the result adopts.
pub(crate) fn flatten<T, U, F>(upstream: &Task<T>, runner: RunnerRef, produce: F) -> Task<U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    F: FnOnce(Upstream<T>) -> Result<Task<U>, TaskError> + Send + 'static,
{
    let (result_runner, slot) = RunnerRef::deferred(runner.clone());
    let value: ValueSlot<U> = Arc::new(SpinMutex::new(None));

    let result = TaskCore::new(
        result_runner,
        Box::new(|incoming: Option<TaskError>| match incoming {
            Some(error) => Err(error),
            None => Ok(()),
        }),
    );
    result.add_parent(upstream.core().clone());

    let inner: Task<Task<U>> = upstream.continue_with(runner.clone(), produce);

    let target = result.clone();
    let forwarded = value.clone();
    let requested = runner.clone();

    let hook = reject_result(result.clone(), slot.clone(), runner.clone());

    let glue = inner.derive(runner, move |nested| {
        match nested.into_result() {
            Ok(nested) => adopt(nested, target, forwarded, slot),
            Err(error) => {
                let _ = slot.set(requested.awaitable());
                target.set_incoming_error(error);
                target.schedule();
            }
        }

        Ok(())
    });

    glue.core().on_reject(hook);
    inner.core().schedule_or_enqueue(glue.core().clone());

    Task::from_parts(result, value)
}

/// Completes `result` with the error of a rejected intermediate task.
///
/// Binds `result` to `runner` first so its own continuations can be
/// scheduled.
fn reject_result(
    result: Arc<TaskCore>,
    slot: Arc<OnceLock<Runner>>,
    runner: RunnerRef,
) -> RejectHook {
    Box::new(move |error| {
        let _ = slot.set(runner.awaitable());
        result.reject(error);
    })
}

/// Wires `result` to complete with the outcome of `nested`.
fn adopt<U>(
    nested: Task<U>,
    result: Arc<TaskCore>,
    value: ValueSlot<U>,
    slot: Arc<OnceLock<Runner>>,
) where
    U: Clone + Send + 'static,
{
    // Known already unless `nested` is itself waiting on a deferred runner;
    // `forward` resolves it at the latest.
    if let Some(runner) = nested.runner() {
        let _ = slot.set(runner);
    }

    let nested_runner = nested.core().runner_ref().clone();
    let target = result.clone();
    let hook = reject_result(result.clone(), slot.clone(), nested_runner.clone());

    let forward = nested.derive(nested_runner.clone(), move |outcome| {
        let _ = slot.set(nested_runner.awaitable());

        match outcome.into_result() {
            Ok(v) => *value.lock() = Some(v),
            Err(error) => target.set_incoming_error(error),
        }

        target.schedule();
        Ok(())
    });

    forward.core().on_reject(hook);
    result.add_parent(forward.core().clone());
    nested.core().schedule_or_enqueue(forward.core().clone());
}
