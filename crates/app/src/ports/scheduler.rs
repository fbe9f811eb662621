//! Scheduler port: deferred re-entry onto the device's run loop.

use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Posts tasks to run after a delay.
///
/// Every task posted to one scheduler runs on the same ordered execution
/// context, never in parallel with another task. Handlers use this to wait
/// between progress updates instead of blocking.
pub trait TaskScheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed. A zero delay queues it behind
    /// the tasks already due.
    fn post(&self, delay: Duration, task: Task);
}

impl<T: TaskScheduler + ?Sized> TaskScheduler for std::sync::Arc<T> {
    fn post(&self, delay: Duration, task: Task) {
        (**self).post(delay, task);
    }
}
