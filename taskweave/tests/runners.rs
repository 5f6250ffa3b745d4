use taskweave::{BackoffPolicy, Error, Flavor, Runner, RunnerBuilder, TaskError};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn disposed_runner(err: &Error) -> Option<String> {
    match err.cause()?.downcast_ref::<Error>()? {
        Error::Disposed { runner } => Some(runner.clone()),
        _ => None,
    }
}

#[test]
fn test_parallel_runner_uses_a_thread_per_task() {
    let runner = Runner::parallel();
    let threads = Arc::new(Mutex::new(HashSet::new()));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let threads = threads.clone();

            runner.schedule(move || {
                threads.lock().unwrap().insert(thread::current().id());
                thread::sleep(Duration::from_millis(10));
                Ok(i * 2)
            })
        })
        .collect();

    let values: Vec<_> = tasks.iter().map(|t| t.wait_value().unwrap()).collect();

    assert_eq!(values, (0..8).map(|i| i * 2).collect::<Vec<_>>());
    assert_eq!(threads.lock().unwrap().len(), 8);
    assert!(!threads.lock().unwrap().contains(&thread::current().id()));
}

#[test]
fn test_parallel_runner_is_idle_after_run_until_idle() {
    let runner = Runner::parallel();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = counter.clone();

        runner
            .schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .then(|_| Ok(()));
    }

    runner.run_until_idle();

    assert_eq!(runner.scheduled_task_count(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_parallel_thread_names() {
    let runner = RunnerBuilder::new()
        .flavor(Flavor::Parallel)
        .thread_name_prefix("worker")
        .stack_size(256 * 1024)
        .build();

    let task = runner.schedule(|| Ok(thread::current().name().map(str::to_owned)));
    let id = task.id().as_u64();

    assert_eq!(task.wait_value().unwrap(), Some(format!("worker-{id}")));
}

#[test]
#[should_panic(expected = "stack_size must be > 0")]
fn test_zero_stack_size_panics() {
    let _ = RunnerBuilder::new().stack_size(0);
}

#[test]
fn test_then_on_hands_off_to_another_runner() {
    let main = Runner::current_thread();
    let workers = RunnerBuilder::new()
        .flavor(Flavor::Parallel)
        .thread_name_prefix("handoff")
        .build();

    let task = main
        .schedule(|| Ok(thread::current().id()))
        .then_on(&workers, |origin| {
            let here = thread::current();
            Ok((origin, here.id(), here.name().map(str::to_owned)))
        });

    let (origin, continued, name) = task.wait_value().unwrap();

    assert_eq!(origin, thread::current().id());
    assert_ne!(continued, origin);
    assert!(name.unwrap().starts_with("handoff-"));
    assert_eq!(task.runner(), Some(workers));
}

#[test]
fn test_parallel_result_continued_on_current_thread() {
    let main = Runner::current_thread();
    let workers = Runner::parallel();

    let task = workers
        .schedule(|| Ok(20))
        .then_on(&main, |x| Ok((x + 1, thread::current().id())));

    let (value, ran_on) = task.wait_value().unwrap();

    assert_eq!(value, 21);
    assert_eq!(ran_on, thread::current().id());
}

#[test]
fn test_current_thread_runs_only_when_driven() {
    let runner = Runner::current_thread();
    let ran = Arc::new(AtomicUsize::new(0));

    let task = {
        let ran = ran.clone();
        runner.schedule(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    thread::sleep(Duration::from_millis(20));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(runner.scheduled_task_count(), 1);

    task.wait().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(runner.scheduled_task_count(), 0);
}

#[test]
fn test_current_thread_accepts_tasks_from_other_threads() {
    let runner = Runner::current_thread();

    let task = {
        let runner = runner.clone();
        thread::spawn(move || runner.schedule(|| Ok(thread::current().id())))
            .join()
            .unwrap()
    };

    assert_eq!(task.wait_value().unwrap(), thread::current().id());
}

#[test]
#[should_panic(expected = "does not own it")]
fn test_current_thread_cannot_be_drained_elsewhere() {
    let runner = Runner::current_thread();

    let result = thread::spawn(move || runner.run_until_idle()).join();

    if let Err(panic) = result {
        std::panic::resume_unwind(panic);
    }
}

#[test]
fn test_manual_runner_driven_from_another_thread() {
    let runner = Runner::manual();
    let task = runner.schedule(|| Ok(thread::current().id())).then(|id| Ok(id));

    let driver = {
        let runner = runner.clone();
        thread::spawn(move || {
            runner.run_until_idle();
            thread::current().id()
        })
    };

    let driver = driver.join().unwrap();
    assert_eq!(task.wait_value().unwrap(), driver);
}

#[test]
fn test_run_next_runs_one_task_at_a_time() {
    let runner = Runner::manual();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..3 {
        let order = order.clone();
        runner.schedule(move || {
            order.lock().unwrap().push(i);
            Ok(())
        });
    }

    assert!(runner.run_next());
    assert_eq!(*order.lock().unwrap(), vec![0]);

    assert!(runner.run_next());
    assert!(runner.run_next());
    assert!(!runner.run_next());
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_dispose_rejects_queued_tasks() {
    let runner = RunnerBuilder::new()
        .flavor(Flavor::Manual)
        .name("shutdown")
        .build();

    let ran = Arc::new(AtomicUsize::new(0));

    let task = {
        let ran = ran.clone();
        runner.schedule(move || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let child = task.then(|_| Ok(1));

    assert!(runner.dispose());
    assert!(!runner.dispose());
    assert!(runner.is_disposed());

    let err = child.wait().unwrap_err();

    assert_eq!(disposed_runner(&err).as_deref(), Some("shutdown"));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(task.is_completed());
    assert_eq!(runner.scheduled_task_count(), 0);
}

#[test]
fn test_schedule_after_dispose_fails_fast() {
    let runner = Runner::parallel();
    runner.dispose();

    let task = runner.schedule(|| Ok(1));

    assert!(task.is_completed());
    assert!(disposed_runner(&task.wait().unwrap_err()).is_some());
}

#[test]
fn test_disposed_runner_error_can_be_caught() {
    let healthy = Runner::current_thread();
    let gone = Runner::manual();
    gone.dispose();

    let value = healthy
        .schedule(|| Ok(1))
        .then_on(&gone, |x| Ok(x + 1))
        .catch_error_on(&healthy, |err| {
            assert!(err.to_string().contains("disposed"));
            Ok(-1)
        })
        .wait_value()
        .unwrap();

    assert_eq!(value, -1);
}

#[test]
fn test_backoff_policies() {
    for backoff in [
        BackoffPolicy::Spin,
        BackoffPolicy::Yield,
        BackoffPolicy::Sleep(Duration::from_millis(1)),
    ] {
        let runner = RunnerBuilder::new()
            .flavor(Flavor::Parallel)
            .backoff(backoff)
            .build();

        let value = runner
            .schedule(|| {
                thread::sleep(Duration::from_millis(5));
                Ok(2)
            })
            .then(|x| Ok(x * 21))
            .wait_value()
            .unwrap();

        assert_eq!(value, 42);

        runner.run_until_idle();
        assert_eq!(runner.scheduled_task_count(), 0);
    }
}

#[test]
fn test_runner_identity_and_names() {
    let a = RunnerBuilder::new().name("alpha").build();
    let b = a.clone();
    let c = Runner::manual();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.name(), "alpha");
    assert!(c.name().starts_with("manual-"));
}

#[test]
fn test_task_error_in_parallel_runner() {
    let runner = Runner::parallel();

    let err = runner
        .schedule(|| Err::<(), _>(TaskError::msg("remote failure")))
        .then(|_| Ok(()))
        .wait()
        .unwrap_err();

    assert_eq!(err.cause().unwrap().to_string(), "remote failure");

    runner.run_until_idle();
    assert_eq!(runner.scheduled_task_count(), 0);
}

#[test]
fn test_parallel_continuation_leaves_manual_queue_alone() {
    let manual = Runner::manual();
    let workers = Runner::parallel();
    let ran_on = Arc::new(Mutex::new(Vec::new()));

    let root = manual.schedule(|| Ok(()));
    let continued = root.then_on(&workers, |_| Ok(()));

    for _ in 0..16 {
        let ran_on = ran_on.clone();

        manual.schedule(move || {
            ran_on.lock().unwrap().push(thread::current().id());
            Ok(())
        });
    }

    assert!(manual.run_next());
    continued.wait().unwrap();

    // Only the root ran; the parallel thread did not drain the rest.
    assert_eq!(manual.scheduled_task_count(), 16);

    manual.run_until_idle();

    let ran_on = ran_on.lock().unwrap();
    assert_eq!(ran_on.len(), 16);
    assert!(ran_on.iter().all(|id| *id == thread::current().id()));
}

#[test]
fn test_current_thread_run_next_from_other_thread_runs_nothing() {
    let runner = Runner::current_thread();
    let task = runner.schedule(|| Ok(()));

    let ran = {
        let runner = runner.clone();
        thread::spawn(move || runner.run_next()).join().unwrap()
    };

    assert!(!ran);
    assert!(!task.is_completed());
    assert!(runner.run_next());
    assert!(task.is_completed());
}
