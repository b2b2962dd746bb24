//! Scheduler implementations
//!
//! - [`TokioScheduler`]: wall-clock timers on a tokio runtime
//! - [`ManualScheduler`]: virtual clock driven by `advance`, for deterministic tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{Cancellable, OnceTask, RepeatingTask, Scheduler, TaskHandle};
use parking_lot::Mutex;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Shortest period either scheduler accepts
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// TokioScheduler
// ============================================================================

/// Spawns timer tasks on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler on the runtime of the calling context
    ///
    /// # Errors
    /// Fails when called outside a tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

struct TokioTask {
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl Cancellable for TokioTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.abort.abort();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Scheduler for TokioScheduler {
    fn run_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                task();
            }
        });

        TaskHandle::new(TokioTask {
            cancelled,
            abort: join.abort_handle(),
        })
    }

    fn run_repeating(&self, delay: Duration, period: Duration, task: RepeatingTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let period = period.max(MIN_PERIOD);

        let join = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                task();
            }
        });

        TaskHandle::new(TokioTask {
            cancelled,
            abort: join.abort_handle(),
        })
    }
}

// ============================================================================
// ManualScheduler
// ============================================================================

enum Job {
    Once(OnceTask),
    Repeating {
        period: Duration,
        task: RepeatingTask,
    },
}

struct Entry {
    due: Duration,
    job: Job,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

struct ManualTask {
    cancelled: Arc<AtomicBool>,
}

impl Cancellable for ManualTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Virtual-time scheduler
///
/// Nothing runs until [`advance`](Self::advance) is called. Due tasks fire on
/// the calling thread in `(due time, registration order)` order. Tasks may
/// schedule or cancel other tasks while running.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    fired: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Scheduled tasks that are not cancelled
    pub fn live_tasks(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| !e.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Total task executions so far
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Move the clock forward by `by`, running everything that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;

        while let Some(run) = self.next_due(target) {
            match run {
                Run::Once(task) => task(),
                Run::Repeating(task) => task(),
            }
            self.fired.fetch_add(1, Ordering::Relaxed);
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
    }

    /// Pop the earliest due task, releasing the lock before it runs
    fn next_due(&self, target: Duration) -> Option<Run> {
        let mut state = self.state.lock();
        state
            .entries
            .retain(|_, e| !e.cancelled.load(Ordering::Acquire));

        let (id, due) = state
            .entries
            .iter()
            .filter(|(_, e)| e.due <= target)
            .min_by_key(|(id, e)| (e.due, **id))
            .map(|(id, e)| (*id, e.due))?;

        state.now = due;
        trace!(task_id = id, at_ms = due.as_millis() as u64, "Manual task due");

        let entry = state.entries.get_mut(&id)?;
        if let Job::Repeating { period, task } = &entry.job {
            let task = Arc::clone(task);
            entry.due = due + *period;
            return Some(Run::Repeating(task));
        }

        match state.entries.remove(&id)?.job {
            Job::Once(task) => Some(Run::Once(task)),
            Job::Repeating { .. } => None,
        }
    }

    fn insert(&self, delay: Duration, job: Job) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + delay;
        state.entries.insert(
            id,
            Entry {
                due,
                job,
                cancelled: Arc::clone(&cancelled),
            },
        );
        TaskHandle::new(ManualTask { cancelled })
    }
}

enum Run {
    Once(OnceTask),
    Repeating(RepeatingTask),
}

impl Scheduler for ManualScheduler {
    fn run_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        self.insert(delay, Job::Once(task))
    }

    fn run_repeating(&self, delay: Duration, period: Duration, task: RepeatingTask) -> TaskHandle {
        self.insert(
            delay,
            Job::Repeating {
                period: period.max(MIN_PERIOD),
                task,
            },
        )
    }
}
