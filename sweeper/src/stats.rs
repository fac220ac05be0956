use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for the runs fired by a PeriodicTimer
#[derive(Debug, Default)]
pub(crate) struct TimerStats {
    /// Counter for how many times the task has been fired
    fire_counter: AtomicUsize,
    /// Runs that returned Ok
    completed_counter: AtomicUsize,
    /// Runs that returned an error
    failed_counter: AtomicUsize,
}

impl TimerStats {
    /// Gets the number of times the task has been fired
    pub(crate) fn fire_counter(&self) -> usize {
        self.fire_counter.load(Ordering::Relaxed)
    }

    /// Increments the fire counter and returns the previous value
    pub(crate) fn increment_fire_counter(&self) -> usize {
        self.fire_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Gets the number of runs that finished successfully
    pub(crate) fn completed_counter(&self) -> usize {
        self.completed_counter.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_completed_counter(&self) {
        self.completed_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the number of runs that returned an error
    pub(crate) fn failed_counter(&self) -> usize {
        self.failed_counter.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_failed_counter(&self) {
        self.failed_counter.fetch_add(1, Ordering::Relaxed);
    }
}
