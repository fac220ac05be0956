use async_trait::async_trait;
use log::LevelFilter;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sweeper::{PeriodicTask, PeriodicTimer, PeriodicTimerOptions, TaskError};

fn setup_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}

fn fast_options() -> PeriodicTimerOptions {
    PeriodicTimerOptions {
        interval: Duration::from_millis(10),
        initial_delay: Duration::ZERO,
    }
}

#[derive(Debug, Default)]
struct CountingTask {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl PeriodicTask for CountingTask {
    fn name(&self) -> &str {
        "counting"
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct FailingTask;

#[async_trait]
impl PeriodicTask for FailingTask {
    fn name(&self) -> &str {
        "failing"
    }

    async fn run(&self) -> Result<(), TaskError> {
        Err("directory unavailable".into())
    }
}

#[derive(Debug, Default)]
struct SlowTask {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl PeriodicTask for SlowTask {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self) -> Result<(), TaskError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(35)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_repeatedly() {
    setup_logger();

    let runs = Arc::new(AtomicUsize::new(0));
    let task = CountingTask { runs: runs.clone() };
    let timer = PeriodicTimer::start_with_opt(task, fast_options());

    tokio::time::sleep(Duration::from_millis(45)).await;

    assert!(timer.fire_counter() >= 3, "fired {}", timer.fire_counter());
    assert!(runs.load(Ordering::SeqCst) >= 3);
    assert_eq!(timer.failed_counter(), 0);
    assert_eq!(timer.task_name(), "counting");
}

#[tokio::test(start_paused = true)]
async fn test_timer_waits_initial_delay() {
    setup_logger();

    let runs = Arc::new(AtomicUsize::new(0));
    let task = CountingTask { runs: runs.clone() };
    let opt = PeriodicTimerOptions::every(Duration::from_secs(60));
    let timer = PeriodicTimer::start_with_opt(task, opt);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(timer.fire_counter(), 0, "no run before the initial delay");

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(timer.fire_counter(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_stops_on_drop() {
    setup_logger();

    let runs = Arc::new(AtomicUsize::new(0));
    let task = CountingTask { runs: runs.clone() };
    let timer = PeriodicTimer::start_with_opt(task, fast_options());

    tokio::time::sleep(Duration::from_millis(25)).await;
    drop(timer);
    tokio::time::sleep(Duration::from_millis(1)).await;
    let after_drop = runs.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), after_drop);
}

#[tokio::test(start_paused = true)]
async fn test_failed_runs_are_counted() {
    setup_logger();

    let timer = PeriodicTimer::start_with_opt(FailingTask, fast_options());
    tokio::time::sleep(Duration::from_millis(25)).await;

    assert!(timer.failed_counter() >= 2);
    assert_eq!(timer.completed_counter(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_runs_are_detached_from_the_trigger() {
    setup_logger();

    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let task = SlowTask {
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: max_in_flight.clone(),
    };
    let timer = PeriodicTimer::start_with_opt(task, fast_options());

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(
        max_in_flight.load(Ordering::SeqCst) > 1,
        "a slow run should not block the next tick"
    );
    timer.stop();
}
