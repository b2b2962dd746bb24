//! 分发指标记录模块
//!
//! 通过 `metrics` facade 记录；未安装 recorder 时全部为 no-op。

use metrics::{counter, gauge, histogram};

/// 记录一次成功发送
///
/// `mode` 为 "personalized" 或 "shared"。
pub fn record_frame_sent(mode: &'static str) {
    counter!("brandcast_frames_sent_total", "mode" => mode).increment(1);
}

/// 记录一次发送失败
pub fn record_send_failure() {
    counter!("brandcast_send_failures_total").increment(1);
}

/// 记录跳过的离线接收者
pub fn record_skipped_inactive() {
    counter!("brandcast_skipped_inactive_total").increment(1);
}

/// 记录一次轮换
pub fn record_rotation(index: usize) {
    counter!("brandcast_rotations_total").increment(1);
    gauge!("brandcast_current_index").set(index as f64);
}

/// 记录队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("brandcast_queue_depth").set(depth as f64);
}

/// 记录一次 drain tick 处理的接收者数量
pub fn record_drain_batch(processed: usize) {
    histogram!("brandcast_drain_batch_size").record(processed as f64);
}

/// 记录缓存查询结果
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("brandcast_cache_lookups_total", "result" => result).increment(1);
}
