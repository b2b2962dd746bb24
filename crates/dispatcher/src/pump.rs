//! Delivery queue and the batch pump that drains it
//!
//! The pump is a single periodic task that wakes every `delay`, hands at most
//! `batch_size` recipients to the delivery callback, and cancels itself once
//! the queue is empty. At most one pump task exists at any time.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use contracts::{RepeatingTask, Scheduler, SharedRecipient, TaskHandle};
use parking_lot::Mutex;

/// FIFO of recipients awaiting the current template
///
/// Unbounded; the same recipient may appear more than once.
pub struct DeliveryQueue {
    tx: Sender<SharedRecipient>,
    rx: Receiver<SharedRecipient>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }

    /// Append recipients in order, returns how many were queued
    pub fn enqueue(&self, recipients: impl IntoIterator<Item = SharedRecipient>) -> usize {
        let mut queued = 0;
        for recipient in recipients {
            if self.tx.try_send(recipient).is_ok() {
                queued += 1;
            }
        }
        queued
    }

    /// Take the head of the queue
    pub fn pop(&self) -> Option<SharedRecipient> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drop everything queued, returns how many entries were discarded
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one drain tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Recipients handed to the delivery callback
    pub processed: usize,
    /// Entries left in the queue afterwards
    pub remaining: usize,
    /// Whether the pump parked itself
    pub parked: bool,
}

/// Single-instance periodic drainer
#[derive(Debug)]
pub struct BatchPump {
    batch_size: usize,
    delay: Duration,
    scheduled: AtomicBool,
    task: Mutex<Option<TaskHandle>>,
}

impl BatchPump {
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
            scheduled: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a pump task is currently scheduled
    pub fn is_running(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Schedule `tick` every `delay` (first after `delay`) unless already running
    ///
    /// Returns true when this call started the pump.
    pub fn ensure_running(&self, scheduler: &dyn Scheduler, tick: RepeatingTask) -> bool {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        // held across scheduling so a tick cannot park before the handle is stored
        let mut slot = self.task.lock();
        if let Some(stale) = slot.take() {
            stale.cancel();
        }
        *slot = Some(scheduler.run_repeating(self.delay, self.delay, tick));
        true
    }

    /// Run one tick: deliver up to `batch_size` recipients, park when drained
    pub fn drain(
        &self,
        queue: &DeliveryQueue,
        mut deliver: impl FnMut(SharedRecipient),
    ) -> DrainOutcome {
        let mut processed = 0;
        while processed < self.batch_size {
            let Some(recipient) = queue.pop() else {
                break;
            };
            deliver(recipient);
            processed += 1;
        }

        let remaining = queue.len();
        let parked = remaining == 0 && self.park();
        DrainOutcome {
            processed,
            remaining,
            parked,
        }
    }

    /// Cancel the pump task and clear the running flag
    ///
    /// Returns whether a task was running.
    pub fn park(&self) -> bool {
        let mut slot = self.task.lock();
        if let Some(task) = slot.take() {
            task.cancel();
        }
        self.scheduled.swap(false, Ordering::SeqCst)
    }
}
