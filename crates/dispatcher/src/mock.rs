//! Mock 接收者与注册表
//!
//! 用于无真实连接的测试：记录收到的帧，可模拟断线与发送失败。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, Recipient, RecipientRegistry, SharedRecipient};
use parking_lot::{Mutex, RwLock};

use crate::codec::decode_frame;

/// Mock 接收者
///
/// 记录每一个收到的帧。
pub struct MockRecipient {
    name: String,
    placement: RwLock<Option<String>>,
    active: AtomicBool,
    failing: AtomicBool,
    received: Mutex<Vec<Bytes>>,
}

impl MockRecipient {
    /// 创建未分配 placement 的接收者
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            placement: RwLock::new(None),
            active: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        }
    }

    /// 创建带 placement 的接收者
    pub fn with_placement(name: impl Into<String>, placement: impl Into<String>) -> Self {
        let recipient = Self::new(name);
        recipient.set_placement(Some(placement.into()));
        recipient
    }

    /// 模拟断线 / 重连
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// 让后续 send 返回错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_placement(&self, placement: Option<String>) {
        *self.placement.write() = placement;
    }

    /// 收到的原始帧
    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().clone()
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().len()
    }

    /// 解码后的全部消息
    pub fn messages(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter_map(|frame| decode_frame(frame).ok().map(|(message, _)| message))
            .collect()
    }

    /// 最后一条解码后的消息
    pub fn last_message(&self) -> Option<String> {
        let received = self.received.lock();
        let frame = received.last()?;
        decode_frame(frame).ok().map(|(message, _)| message)
    }
}

impl Recipient for MockRecipient {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn current_placement(&self) -> Option<String> {
        self.placement.read().clone()
    }

    fn send(&self, payload: Bytes) -> Result<(), ContractError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContractError::recipient_send(&self.name, "mock failure"));
        }
        self.received.lock().push(payload);
        Ok(())
    }
}

/// Mock 注册表
pub struct MockRegistry {
    recipients: RwLock<Vec<SharedRecipient>>,
    capacity: u32,
}

impl MockRegistry {
    pub fn new(capacity: u32) -> Self {
        Self {
            recipients: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// 批量创建 `p0..pN` 接收者，返回注册表和具体类型的句柄
    pub fn with_recipients(capacity: u32, count: usize) -> (Self, Vec<Arc<MockRecipient>>) {
        let registry = Self::new(capacity);
        let recipients: Vec<Arc<MockRecipient>> = (0..count)
            .map(|i| Arc::new(MockRecipient::new(format!("p{i}"))))
            .collect();
        for recipient in &recipients {
            registry.add(recipient.clone());
        }
        (registry, recipients)
    }

    pub fn add(&self, recipient: SharedRecipient) {
        self.recipients.write().push(recipient);
    }

    /// 按名称移除，返回是否找到
    pub fn remove(&self, name: &str) -> bool {
        let mut recipients = self.recipients.write();
        let before = recipients.len();
        recipients.retain(|r| r.display_name() != name);
        recipients.len() != before
    }
}

impl RecipientRegistry for MockRegistry {
    fn snapshot(&self) -> Vec<SharedRecipient> {
        self.recipients.read().clone()
    }

    fn online_count(&self) -> usize {
        self.recipients.read().len()
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }
}
