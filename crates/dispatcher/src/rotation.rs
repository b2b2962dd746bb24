//! Rotation - which template is current, and the periodic task advancing it

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use contracts::{RepeatingTask, Scheduler, TaskHandle};
use parking_lot::Mutex;

/// Current template index, `< len` whenever there are templates
#[derive(Debug)]
pub struct RotationState {
    index: AtomicUsize,
    len: usize,
}

impl RotationState {
    /// State over `len` templates, starting at index 0
    pub fn new(len: usize) -> Self {
        Self {
            index: AtomicUsize::new(0),
            len,
        }
    }

    /// Current index
    pub fn current(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Advance cyclically and return the new index
    ///
    /// With no templates the index stays at 0.
    pub fn advance(&self) -> usize {
        let len = self.len.max(1);
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        (previous + 1) % len
    }

    /// Jump to `index`
    ///
    /// Out-of-range values (including negatives) are ignored and return false.
    pub fn set(&self, index: i64) -> bool {
        match usize::try_from(index) {
            Ok(i) if i < self.len => {
                self.index.store(i, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Owns the periodic rotation task
#[derive(Debug)]
pub struct RotationController {
    period: Duration,
    task: Mutex<Option<TaskHandle>>,
}

impl RotationController {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            task: Mutex::new(None),
        }
    }

    /// Rotation only makes sense with several templates and a non-zero period
    pub fn should_rotate(&self, templates: usize) -> bool {
        templates > 1 && !self.period.is_zero()
    }

    /// Schedule `tick` every period, first after one period
    ///
    /// Returns false if a task is already active.
    pub fn start(&self, scheduler: &dyn Scheduler, tick: RepeatingTask) -> bool {
        let mut slot = self.task.lock();
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return false;
        }
        *slot = Some(scheduler.run_repeating(self.period, self.period, tick));
        true
    }

    /// Whether the periodic task is scheduled
    pub fn is_active(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Cancel the periodic task; idempotent
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel();
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_advance_is_cyclic() {
        let state = RotationState::new(3);
        let seen: Vec<usize> = (0..7).map(|_| state.advance()).collect();
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_single_template_stays_at_zero() {
        let state = RotationState::new(1);
        assert_eq!(state.advance(), 0);
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_set_bounds() {
        let state = RotationState::new(3);
        assert!(state.set(2));
        assert_eq!(state.current(), 2);

        assert!(!state.set(3));
        assert!(!state.set(-1));
        assert!(!state.set(i64::MAX));
        assert_eq!(state.current(), 2);

        assert!(state.set(0));
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_empty_state_rejects_every_index() {
        let state = RotationState::new(0);
        assert!(state.is_empty());
        assert!(!state.set(0));
        assert_eq!(state.advance(), 0);
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_concurrent_advance_stays_in_range() {
        let state = Arc::new(RotationState::new(5));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(state.advance() < 5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 4000 advances from 0 land back on 0
        assert_eq!(state.current(), 0);
    }

    #[test]
    fn test_should_rotate() {
        let controller = RotationController::new(Duration::from_secs(5));
        assert!(controller.should_rotate(2));
        assert!(!controller.should_rotate(1));
        assert!(!RotationController::new(Duration::ZERO).should_rotate(3));
    }

    #[test]
    fn test_controller_start_stop() {
        let scheduler = ManualScheduler::new();
        let ticks = Arc::new(AtomicU32::new(0));
        let controller = RotationController::new(Duration::from_secs(5));

        let counter = Arc::clone(&ticks);
        assert!(controller.start(
            &scheduler,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        ));
        assert!(controller.is_active());
        assert!(!controller.start(&scheduler, Arc::new(|| {})));

        scheduler.advance(Duration::from_millis(4_999));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        controller.stop();
        controller.stop();
        assert!(!controller.is_active());
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
