//! # Dispatcher
//!
//! 轮换广播分发模块。
//!
//! 负责：
//! - 按固定周期轮换消息模板
//! - 将当前模板批量投递给所有在线接收者，不阻塞调用方
//! - 按渲染结果缓存编码后的帧，避免重复编码
//!
//! ## 使用示例
//!
//! ```ignore
//! use dispatcher::{create_dispatcher, TokioScheduler};
//!
//! let scheduler = Arc::new(TokioScheduler::current()?);
//! let dispatcher = create_dispatcher(&config.brand, scheduler, registry);
//!
//! dispatcher.send_immediate(recipient.as_ref());
//! dispatcher.broadcast_current();
//! dispatcher.stop();
//! ```

pub mod cache;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod pump;
pub mod render;
pub mod rotation;
pub mod scheduler;

pub use cache::PayloadCache;
pub use codec::{decode_frame, encode_frame, read_varint, Encoder, FrameEncoder};
pub use contracts::{Recipient, RecipientRegistry, Scheduler, SharedRecipient, TaskHandle};
pub use dispatcher::{
    create_dispatcher, DeliveryOutcome, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use mock::{MockRecipient, MockRegistry};
pub use pump::{BatchPump, DeliveryQueue, DrainOutcome};
pub use render::{is_personal, render, DeliveryMode, RenderContext};
pub use rotation::{RotationController, RotationState};
pub use scheduler::{ManualScheduler, TokioScheduler};
