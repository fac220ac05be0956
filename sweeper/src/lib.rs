//! `PeriodicTimer` fires a task on a fixed interval and keeps firing it until the timer is dropped.
//!
//! Every firing is spawned as its own tokio task, so a slow run never delays the next tick
//! and the run itself is asynchronous relative to the trigger. Tasks that must not overlap
//! are expected to guard themselves.

use log::{debug, info, warn};
use stats::TimerStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use task::{report, PeriodicTask, TaskError};

mod stats;
mod task;

#[derive(Debug)]
pub struct PeriodicTimer {
    /// A cancellation token to signal shutdown.
    shutdown_token: CancellationToken,
    /// The name of the task (for logging).
    task_name: String,
    /// Statistics about the fired runs
    stats: Arc<TimerStats>,
}

#[derive(Debug, Clone)]
pub struct PeriodicTimerOptions {
    /// Time between two firings (default: 600 s)
    pub interval: Duration,
    /// Delay before the first firing (default: 600 s)
    pub initial_delay: Duration,
}

impl Default for PeriodicTimerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            initial_delay: Duration::from_secs(600),
        }
    }
}

impl PeriodicTimerOptions {
    /// Options firing every `interval`, the first time after one full interval.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            initial_delay: interval,
        }
    }
}

impl PeriodicTimer {
    /// Starts firing the task with the default schedule.
    ///
    /// When the `PeriodicTimer` is dropped, no further runs are fired.
    /// Runs already in flight complete on their own.
    ///
    /// # Arguments
    /// * `task` - The task to run on every tick.
    pub fn start<T: PeriodicTask>(task: T) -> Self {
        Self::start_with_opt(task, Default::default())
    }

    /// Starts firing the task with a custom schedule.
    ///
    /// # Arguments
    /// * `task` - The task to run on every tick.
    /// * `opt` - Schedule of the timer.
    pub fn start_with_opt<T: PeriodicTask>(task: T, opt: PeriodicTimerOptions) -> Self {
        let shutdown_token = CancellationToken::new();
        let task_name = task.name().to_string();

        let mut handle = Self {
            shutdown_token,
            task_name,
            stats: Arc::new(TimerStats::default()),
        };

        handle.spawn(Arc::new(task), opt);
        handle
    }

    /// Gets the number of times the task has been fired
    pub fn fire_counter(&self) -> usize {
        self.stats.fire_counter()
    }

    /// Gets the number of runs that finished successfully
    pub fn completed_counter(&self) -> usize {
        self.stats.completed_counter()
    }

    /// Gets the number of runs that returned an error
    pub fn failed_counter(&self) -> usize {
        self.stats.failed_counter()
    }

    /// Name of the task driven by this timer
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Stops firing the task. Equivalent to dropping the timer.
    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }

    fn spawn<T: PeriodicTask>(&mut self, task: Arc<T>, opt: PeriodicTimerOptions) {
        let shutdown_token = self.shutdown_token.clone();
        let task_name = self.task_name.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    debug!("Timer for '{}' cancelled before its first run", task_name);
                    return;
                }
                _ = tokio::time::sleep(opt.initial_delay) => {}
            }
            info!(
                "Starting periodic runs of '{}' every {:?}",
                task_name, opt.interval
            );

            let mut ticker = interval(opt.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => {
                        info!("Timer for '{}' shutting down", task_name);
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let count = stats.increment_fire_counter();
                debug!("Firing '{}' (run {})", task_name, count + 1);

                let task = Arc::clone(&task);
                let stats = Arc::clone(&stats);
                let task_name = task_name.clone();
                tokio::spawn(async move {
                    match task.run().await {
                        Ok(()) => {
                            stats.increment_completed_counter();
                        }
                        Err(e) => {
                            stats.increment_failed_counter();
                            warn!("Run of '{}' failed: {}", task_name, report(e.as_ref()));
                        }
                    }
                });
            }
        });
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        info!("Timer for '{}' is dropping, no further runs", self.task_name);
        self.shutdown_token.cancel();
    }
}
