//! Scheduler trait - host timer capability
//!
//! The dispatcher asks the host for two things: run a callback once after a
//! delay, and run a callback repeatedly on a fixed period. Both return a
//! [`TaskHandle`] that cancels the task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback executed once
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Callback executed on every tick of a periodic task
pub type RepeatingTask = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler-specific cancellation hook behind a [`TaskHandle`].
pub trait Cancellable: Send + Sync {
    /// Stop future executions. Must be idempotent.
    fn cancel(&self);

    /// Whether `cancel` has been requested
    fn is_cancelled(&self) -> bool;
}

/// Cancellable handle to a scheduled task.
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle {
    inner: Box<dyn Cancellable>,
}

impl TaskHandle {
    /// Wrap a scheduler-specific cancellation hook
    pub fn new(inner: impl Cancellable + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// Cancel the task; no further executions start after this returns
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Host timer capability
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn run_once(&self, delay: Duration, task: OnceTask) -> TaskHandle;

    /// Run `task` every `period`, first after `delay`
    fn run_repeating(&self, delay: Duration, period: Duration, task: RepeatingTask) -> TaskHandle;
}
