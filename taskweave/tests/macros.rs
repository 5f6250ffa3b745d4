use taskweave::{Runner, TaskError, async_runner};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[taskweave::test]
fn test_macro_installs_runner() {
    assert!(async_runner().is_some());

    let value = taskweave::schedule(|| Ok(20)).then(|x| Ok(x + 22)).wait_value().unwrap();
    assert_eq!(value, 42);
}

#[taskweave::test(flavor = "parallel")]
fn test_macro_parallel_flavor() {
    let task = taskweave::schedule(|| Ok(thread::current().id()));

    assert_ne!(task.wait_value().unwrap(), thread::current().id());
}

#[taskweave::test(flavor = "manual")]
fn test_macro_manual_flavor() {
    let runner = async_runner().unwrap();
    let task = taskweave::schedule(|| Ok(()));

    assert_eq!(runner.scheduled_task_count(), 1);
    assert!(runner.run_next());
    assert!(task.is_completed());
}

#[taskweave::test]
fn test_macro_drains_pending_work() {
    let counter = Arc::new(AtomicUsize::new(0));

    // Never awaited here; the runner drains it before the test returns.
    let witness = counter.clone();
    taskweave::schedule(move || {
        witness.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[taskweave::test]
fn test_macro_with_result() -> Result<(), taskweave::Error> {
    let other = Runner::manual();
    let task = taskweave::schedule(|| Err::<(), _>(TaskError::msg("caught")))
        .catch_error_on(&other, |_| Ok(1));

    other.run_until_idle();
    taskweave::schedule(|| Ok(())).wait()?;

    assert_eq!(task.wait_value()?, 1);
    Ok(())
}
