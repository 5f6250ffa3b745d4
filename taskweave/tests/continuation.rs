use taskweave::{Error, Runner, TaskError};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_then_async_adopts_nested_result() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = {
        let workers = workers.clone();
        main.schedule(|| Ok(2))
            .then_async(move |x| Ok(workers.schedule(move || Ok(x * 10))))
    };

    assert_eq!(task.wait_value().unwrap(), 20);
    assert_eq!(task.runner(), Some(workers));
}

#[test]
fn test_then_async_on_same_runner() {
    let runner = Runner::current_thread();

    let task = runner
        .schedule(|| Ok(String::from("weave")))
        .then_async(|s| Ok(taskweave::schedule(move || Ok(s.len()))))
        .then(|len| Ok(len + 1));

    assert_eq!(task.wait_value().unwrap(), 6);
}

#[test]
fn test_then_async_continuations_follow_nested_runner() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = {
        let workers = workers.clone();
        main.schedule(|| Ok(()))
            .then_async(move |_| Ok(workers.schedule(|| Ok(()))))
            .then(|_| Ok(thread::current().name().map(str::to_owned)))
    };

    let name = task.wait_value().unwrap();

    assert!(name.is_some());
    assert_ne!(name.as_deref(), thread::current().name());
}

#[test]
fn test_then_async_nested_failure_propagates() {
    let runner = Runner::current_thread();
    let workers = Runner::parallel();

    let err = runner
        .schedule(|| Ok(1))
        .then_async(move |_| Ok(workers.schedule(|| Err::<i32, _>(TaskError::msg("nested")))))
        .then(|x| Ok(x + 1))
        .wait_value()
        .unwrap_err();

    assert_eq!(err.cause().unwrap().to_string(), "nested");
}

#[test]
fn test_then_async_producer_failure_propagates() {
    let runner = Runner::current_thread();

    let err = runner
        .schedule(|| Ok(1))
        .then_async(|_| -> Result<taskweave::Task<i32>, TaskError> { Err(TaskError::msg("no task")) })
        .wait()
        .unwrap_err();

    assert_eq!(err.cause().unwrap().to_string(), "no task");
}

#[test]
fn test_then_async_skipped_on_upstream_failure() {
    let runner = Runner::current_thread();
    let called = Arc::new(AtomicUsize::new(0));

    let err = {
        let called = called.clone();
        runner
            .schedule(|| Err::<i32, _>(TaskError::msg("upstream")))
            .then_async(move |x| {
                called.fetch_add(1, Ordering::SeqCst);
                Ok(taskweave::schedule(move || Ok(x)))
            })
            .wait()
            .unwrap_err()
    };

    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert_eq!(err.cause().unwrap().to_string(), "upstream");
}

#[test]
fn test_then_async_on_runs_producer_on_given_runner() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = main
        .schedule(|| Ok(thread::current().id()))
        .then_async_on(&workers, |origin| {
            let producer = thread::current().id();
            Ok(taskweave::schedule(move || Ok((origin, producer))))
        });

    let (origin, producer) = task.wait_value().unwrap();

    assert_eq!(origin, thread::current().id());
    assert_ne!(producer, origin);
}

#[test]
fn test_catch_error_async_recovers_on_other_runner() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = main
        .schedule(|| Err::<i32, _>(TaskError::msg("offline")))
        .catch_error_async(move |err| {
            let message = err.to_string();
            Ok(workers.schedule(move || Ok(message.len() as i32)))
        });

    assert_eq!(task.wait_value().unwrap(), 7);
}

#[test]
fn test_catch_error_async_on_success_yields_default() {
    let runner = Runner::current_thread();
    let called = Arc::new(AtomicUsize::new(0));

    let task = {
        let called = called.clone();
        runner.schedule(|| Ok(9)).catch_error_async(move |_| {
            called.fetch_add(1, Ordering::SeqCst);
            Ok(taskweave::schedule(|| Ok(String::from("fallback"))))
        })
    };

    assert_eq!(task.wait_value().unwrap(), String::new());
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert_eq!(task.runner(), Some(runner));
}

#[test]
fn test_catch_error_async_handler_failure() {
    let runner = Runner::current_thread();

    let err = runner
        .schedule(|| Err::<(), _>(TaskError::msg("first")))
        .catch_error_async(|_| Ok(taskweave::schedule(|| -> Result<u8, TaskError> { panic!("second") })))
        .wait()
        .unwrap_err();

    match err.cause().and_then(|cause| cause.downcast_ref::<Error>()) {
        Some(Error::Panicked(message)) => assert_eq!(message, "second"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_nested_then_async_chains() {
    let runner = Runner::current_thread();
    let workers = Runner::parallel();

    let task = {
        let workers = workers.clone();
        runner.schedule(|| Ok(1)).then_async(move |x| {
            let inner = workers.clone();
            Ok(workers
                .schedule(move || Ok(x + 1))
                .then_async(move |y| Ok(inner.schedule(move || Ok(y * 10)))))
        })
    };

    assert_eq!(task.wait_value().unwrap(), 20);

    workers.run_until_idle();
    assert_eq!(workers.scheduled_task_count(), 0);
}

fn disposed(err: &Error) -> bool {
    matches!(
        err.cause().and_then(|cause| cause.downcast_ref::<Error>()),
        Some(Error::Disposed { .. })
    )
}

#[test]
fn test_then_async_lands_on_waiting_threads_runner() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = {
        let main = main.clone();
        workers.schedule(|| Ok(1)).then_async(move |x| {
            thread::sleep(Duration::from_millis(50));
            Ok(main.schedule(move || Ok((x + 1, thread::current().id()))))
        })
    };

    let (value, ran_on) = task.wait_value().unwrap();

    assert_eq!(value, 2);
    assert_eq!(ran_on, thread::current().id());
    assert_eq!(task.runner(), Some(main));
}

#[test]
fn test_then_async_completes_when_runner_disposed() {
    let runner = Runner::manual();

    let task = runner
        .schedule(|| Ok(1))
        .then_async(|x| Ok(taskweave::schedule(move || Ok(x + 1))));
    let after = task.then(|x| Ok(x * 2));

    assert!(runner.dispose());

    assert!(disposed(&task.wait_value().unwrap_err()));
    assert!(disposed(&after.wait().unwrap_err()));
    assert_eq!(task.runner(), Some(runner));
}

#[test]
fn test_then_async_completes_when_nested_runner_disposed() {
    let main = Runner::current_thread();
    let nested = Runner::manual();

    let task = {
        let nested = nested.clone();
        main.schedule(|| Ok(1))
            .then_async(move |x| Ok(nested.schedule(move || Ok(x + 1))))
    };

    // Leaves the forwarding task parked on the nested task.
    main.run_until_idle();
    assert!(!task.is_completed());

    assert!(nested.dispose());

    assert!(disposed(&task.wait().unwrap_err()));
    assert_eq!(task.runner(), Some(nested));
}

#[test]
fn test_then_async_on_disposed_runner_fails_fast() {
    let runner = Runner::manual();
    runner.dispose();

    let task = runner
        .schedule(|| Ok(1))
        .then_async(|x| Ok(taskweave::schedule(move || Ok(x))));

    assert!(task.is_completed());
    assert!(disposed(&task.wait().unwrap_err()));
}
