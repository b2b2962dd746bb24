//! Dispatcher - composition root for rotation, delivery queue and cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, instrument, trace, warn};

use contracts::{BrandConfig, Recipient, RecipientRegistry, RepeatingTask, Scheduler};
use observability::{
    record_drain_batch, record_frame_sent, record_queue_depth, record_rotation,
    record_send_failure, record_skipped_inactive,
};

use crate::cache::PayloadCache;
use crate::codec::{Encoder, FrameEncoder};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::pump::{BatchPump, DeliveryQueue};
use crate::render::{render, DeliveryMode, RenderContext};
use crate::rotation::{RotationController, RotationState};

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Message templates, rotated in order
    pub templates: Vec<String>,
    /// Rotation period (zero = never rotate)
    pub rotation_period: Duration,
    /// Recipients handled per drain tick
    pub batch_size: usize,
    /// Delay between drain ticks
    pub batch_delay: Duration,
    /// Render rotation broadcasts without `{player}` / `{server}`
    pub personalize_on_connect_only: bool,
    /// Raise per-send logs to info / warn
    pub verbose: bool,
    /// Payload cache bound (None = unbounded)
    pub cache_capacity: Option<usize>,
}

impl From<&BrandConfig> for DispatcherConfig {
    fn from(brand: &BrandConfig) -> Self {
        Self {
            templates: brand.messages.clone(),
            rotation_period: brand.update_interval(),
            batch_size: brand.send_batch_size,
            batch_delay: brand.batch_delay(),
            personalize_on_connect_only: brand.personalize_on_connect_only,
            verbose: brand.debug,
            cache_capacity: brand.cache_capacity,
        }
    }
}

/// Result of handing one recipient its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Frame accepted by the transport
    Sent,
    /// Recipient had disconnected
    SkippedInactive,
    /// Transport refused the frame (logged, not retried)
    Failed,
    /// Dispatcher already stopped
    Stopped,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<dyn RecipientRegistry>,
    encoder: Arc<dyn Encoder>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(
        config: DispatcherConfig,
        scheduler: Arc<dyn Scheduler>,
        registry: Arc<dyn RecipientRegistry>,
    ) -> Self {
        Self {
            config,
            scheduler,
            registry,
            encoder: Arc::new(FrameEncoder),
        }
    }

    /// Replace the frame encoder
    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Build the dispatcher and start rotation
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(templates = self.config.templates.len())
    )]
    pub fn build(self) -> Dispatcher {
        let config = self.config;
        let scheduler = self.scheduler;
        let registry = self.registry;
        let encoder = self.encoder;

        let shared = Arc::new_cyclic(|weak_self| Shared {
            weak_self: weak_self.clone(),
            state: RotationState::new(config.templates.len()),
            rotation: RotationController::new(config.rotation_period),
            queue: DeliveryQueue::new(),
            pump: BatchPump::new(config.batch_size, config.batch_delay),
            cache: PayloadCache::with_encoder(encoder, config.cache_capacity),
            metrics: DispatchMetrics::new(),
            stopped: AtomicBool::new(false),
            templates: config.templates,
            broadcast_mode: if config.personalize_on_connect_only {
                DeliveryMode::Shared
            } else {
                DeliveryMode::Personalized
            },
            verbose: config.verbose,
            scheduler,
            registry,
        });

        shared.start_rotation();
        Dispatcher { shared }
    }
}

/// Convenience function to create a dispatcher from the brand section
pub fn create_dispatcher(
    brand: &BrandConfig,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<dyn RecipientRegistry>,
) -> Dispatcher {
    DispatcherBuilder::new(DispatcherConfig::from(brand), scheduler, registry).build()
}

/// State reachable from scheduled callbacks
///
/// Callbacks hold a `Weak`, so a dropped dispatcher is never kept alive by
/// its own timers.
struct Shared {
    weak_self: Weak<Shared>,
    templates: Vec<String>,
    broadcast_mode: DeliveryMode,
    verbose: bool,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<dyn RecipientRegistry>,
    state: RotationState,
    rotation: RotationController,
    queue: DeliveryQueue,
    pump: BatchPump,
    cache: PayloadCache,
    metrics: DispatchMetrics,
    stopped: AtomicBool,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn current_template(&self) -> &str {
        self.templates
            .get(self.state.current())
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn render_context(&self) -> RenderContext {
        RenderContext {
            online: self.registry.online_count(),
            max_players: self.registry.capacity(),
        }
    }

    fn start_rotation(&self) {
        let period = self.rotation.period();
        if !self.rotation.should_rotate(self.templates.len()) {
            info!(
                templates = self.templates.len(),
                period_ms = period.as_millis() as u64,
                "Rotation idle"
            );
            return;
        }

        let weak = self.weak_self.clone();
        let tick: RepeatingTask = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.rotate();
            }
        });

        if self.rotation.start(self.scheduler.as_ref(), tick) {
            info!(
                templates = self.templates.len(),
                period_ms = period.as_millis() as u64,
                "Rotation started"
            );
        }
    }

    /// Rotation tick
    fn rotate(&self) {
        if self.is_stopped() {
            return;
        }

        let index = self.state.advance();
        self.metrics.inc_rotations();
        record_rotation(index);

        if self.verbose {
            info!(index, template = %self.current_template(), "Rotated");
        } else {
            debug!(index, "Rotated");
        }

        self.broadcast();
    }

    /// Enqueue a snapshot of every connected recipient
    fn broadcast(&self) -> usize {
        if self.is_stopped() {
            return 0;
        }

        let recipients = self.registry.snapshot();
        if recipients.is_empty() {
            trace!("No recipients connected, nothing to broadcast");
            return 0;
        }

        let queued = self.queue.enqueue(recipients);
        self.metrics.add_enqueued(queued);
        let depth = self.queue.len();
        self.metrics.set_queue_len(depth);
        record_queue_depth(depth);
        debug!(queued, depth, "Recipients enqueued");

        self.ensure_pump();
        queued
    }

    fn ensure_pump(&self) {
        if self.is_stopped() {
            self.queue.clear();
            return;
        }
        if self.pump.is_running() {
            return;
        }

        let weak = self.weak_self.clone();
        let tick: RepeatingTask = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.drain_tick();
            }
        });

        if self.pump.ensure_running(self.scheduler.as_ref(), tick) {
            // stop() may have parked before this arm landed
            if self.is_stopped() {
                self.pump.park();
                self.queue.clear();
                return;
            }
            debug!(
                batch_size = self.pump.batch_size(),
                delay_ms = self.pump.delay().as_millis() as u64,
                "Batch pump started"
            );
        }
    }

    /// Drain tick
    fn drain_tick(&self) {
        if self.is_stopped() {
            self.pump.park();
            return;
        }

        self.metrics.inc_drain_ticks();
        let ctx = self.render_context();
        let template = self.current_template();
        let mode = self.broadcast_mode;

        let outcome = self.pump.drain(&self.queue, |recipient| {
            self.deliver(recipient.as_ref(), template, &ctx, mode);
        });

        self.metrics.set_queue_len(outcome.remaining);
        record_queue_depth(outcome.remaining);
        record_drain_batch(outcome.processed);
        trace!(
            processed = outcome.processed,
            remaining = outcome.remaining,
            "Drain tick"
        );

        if outcome.parked {
            debug!("Batch pump parked");
            // an enqueue may have raced the park
            if !self.queue.is_empty() {
                self.ensure_pump();
            }
        }
    }

    fn deliver(
        &self,
        recipient: &dyn Recipient,
        template: &str,
        ctx: &RenderContext,
        mode: DeliveryMode,
    ) -> DeliveryOutcome {
        if !recipient.is_active() {
            self.metrics.inc_skipped_inactive();
            record_skipped_inactive();
            trace!(recipient = %recipient.display_name(), "Skipping inactive recipient");
            return DeliveryOutcome::SkippedInactive;
        }

        let personal = match mode {
            DeliveryMode::Personalized => Some(recipient),
            DeliveryMode::Shared => None,
        };
        let message = render(template, ctx, personal);
        let frame = self.cache.get_or_encode(&message);

        match recipient.send(frame) {
            Ok(()) => {
                self.metrics.inc_sent();
                record_frame_sent(mode.as_str());
                if self.verbose {
                    info!(recipient = %recipient.display_name(), message = %message, "Frame sent");
                } else {
                    trace!(recipient = %recipient.display_name(), "Frame sent");
                }
                DeliveryOutcome::Sent
            }
            Err(e) => {
                self.metrics.inc_failures();
                record_send_failure();
                if self.verbose {
                    warn!(recipient = %recipient.display_name(), error = %e, "Send failed");
                } else {
                    debug!(recipient = %recipient.display_name(), error = %e, "Send failed");
                }
                DeliveryOutcome::Failed
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // ticks hold only a Weak, so nothing else can cancel them now
        self.rotation.stop();
        self.pump.park();
    }
}

/// Rotating broadcast dispatcher
///
/// Dropping the dispatcher stops it.
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Render the current template for `recipient` with full personalization
    /// and send it now, bypassing the queue.
    pub fn send_immediate(&self, recipient: &dyn Recipient) -> DeliveryOutcome {
        let shared = &self.shared;
        if shared.is_stopped() {
            debug!(recipient = %recipient.display_name(), "Dispatcher stopped, immediate send ignored");
            return DeliveryOutcome::Stopped;
        }
        let ctx = shared.render_context();
        shared.deliver(
            recipient,
            shared.current_template(),
            &ctx,
            DeliveryMode::Personalized,
        )
    }

    /// Enqueue every connected recipient for the current template without
    /// advancing the index. Returns how many were queued.
    #[instrument(name = "dispatcher_broadcast", skip(self))]
    pub fn broadcast_current(&self) -> usize {
        let queued = self.shared.broadcast();
        info!(queued, index = self.current_index(), "Broadcast requested");
        queued
    }

    /// Jump to template `index`; out-of-range values are ignored
    pub fn set_index(&self, index: i64) -> bool {
        let applied = self.shared.state.set(index);
        if applied {
            info!(index, "Template index set");
        } else {
            debug!(
                index,
                templates = self.shared.templates.len(),
                "Template index out of range, ignored"
            );
        }
        applied
    }

    pub fn current_index(&self) -> usize {
        self.shared.state.current()
    }

    /// Current template, empty when none are configured
    pub fn current_template(&self) -> &str {
        self.shared.current_template()
    }

    pub fn templates(&self) -> &[String] {
        &self.shared.templates
    }

    /// Whether the periodic rotation task is scheduled
    pub fn is_rotation_active(&self) -> bool {
        self.shared.rotation.is_active()
    }

    /// Whether a drain cycle is scheduled
    pub fn is_pump_running(&self) -> bool {
        self.shared.pump.is_running()
    }

    /// Recipients waiting in the delivery queue
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn cache(&self) -> &PayloadCache {
        &self.shared.cache
    }

    /// Get a snapshot of all counters, cache figures included
    pub fn metrics(&self) -> MetricsSnapshot {
        let cache = &self.shared.cache;
        MetricsSnapshot {
            queue_len: self.shared.queue.len(),
            cache_entries: cache.len(),
            cache_hits: cache.hits(),
            cache_misses: cache.misses(),
            ..self.shared.metrics.snapshot()
        }
    }

    /// Cancel both timers, clear queue and cache
    ///
    /// Idempotent. A tick already executing may finish but cannot re-arm.
    #[instrument(name = "dispatcher_stop", skip(self))]
    pub fn stop(&self) {
        let shared = &self.shared;
        let first = !shared.stopped.swap(true, Ordering::SeqCst);

        shared.rotation.stop();
        shared.pump.park();
        let dropped = shared.queue.clear();
        shared.cache.clear();
        shared.metrics.set_queue_len(0);
        record_queue_depth(0);

        if first {
            info!(dropped, "Dispatcher stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
