use taskweave::{Flavor, Runner, RunnerBuilder, TaskError};

use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("taskweave=trace"))
        .with_test_writer()
        .try_init();
}

#[test]
fn test_runtime_with_trace_subscriber() {
    init_tracing();

    let main = Runner::current_thread();
    let workers = RunnerBuilder::new()
        .flavor(Flavor::Parallel)
        .name("traced")
        .build();

    let value = main
        .schedule_named("seed", || Ok(1))
        .then_on(&workers, |x| Ok(x + 1))
        .then_async(|x| Ok(taskweave::schedule(move || Ok(x * 3))))
        .wait_value()
        .unwrap();

    assert_eq!(value, 6);

    workers.run_until_idle();
    assert!(workers.dispose());
}

#[test]
fn test_rejection_is_logged_and_reported() {
    init_tracing();

    let runner = Runner::manual();
    let queued = runner.schedule(|| Err::<(), _>(TaskError::msg("never runs")));

    runner.dispose();

    let late = runner.schedule(|| Ok(()));

    assert!(queued.wait().unwrap_err().to_string().contains("disposed"));
    assert!(late.wait().is_err());
}
