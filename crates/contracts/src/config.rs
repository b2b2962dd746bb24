//! ServiceConfig - Config Loader 输出
//!
//! 描述完整的服务配置：品牌消息轮换策略、批量发送参数、宿主监听设置。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message used when the configured list is empty
pub const DEFAULT_BRAND_MESSAGE: &str = "DeepCraft";
/// Default rotation period (ms)
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 5000;
/// Smallest rotation period accepted before normalization (ms)
pub const MIN_UPDATE_INTERVAL_MS: u64 = 1000;
/// Default recipients per drain tick
pub const DEFAULT_SEND_BATCH_SIZE: usize = 200;
/// Default delay between drain ticks (ms)
pub const DEFAULT_BATCH_DELAY_MS: u64 = 50;
/// Smallest drain delay accepted before normalization (ms)
pub const MIN_BATCH_DELAY_MS: u64 = 10;
/// Default bound on encoded payloads kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 品牌消息轮换配置
    #[serde(default)]
    pub brand: BrandConfig,

    /// 宿主 (传输层) 配置
    #[serde(default)]
    pub host: HostConfig,
}

/// 品牌消息轮换与批量发送配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandConfig {
    /// 消息模板列表，按顺序轮换
    #[serde(default = "default_messages")]
    pub messages: Vec<String>,

    /// 轮换周期 (毫秒)
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// 每个 drain tick 发送的接收者数量
    #[serde(default = "default_send_batch_size")]
    pub send_batch_size: usize,

    /// drain tick 之间的间隔 (毫秒)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// 为 true 时，轮换广播使用非个性化渲染 ({player}/{server} 仅在连接时替换)
    #[serde(default = "default_true")]
    pub personalize_on_connect_only: bool,

    /// 详细日志
    #[serde(default)]
    pub debug: bool,

    /// 编码缓存上限 (None = 不限，文件中写作 "unbounded")
    #[serde(default = "default_cache_capacity", with = "cache_capacity")]
    pub cache_capacity: Option<usize>,
}

impl BrandConfig {
    /// Rotation period as a `Duration`
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Drain delay as a `Duration`
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            send_batch_size: DEFAULT_SEND_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            personalize_on_connect_only: true,
            debug: false,
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// 宿主配置：TCP 监听、容量、连接稳定延迟
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// 监听地址
    #[serde(default = "default_listen")]
    pub listen: String,

    /// `{max_players}` 占位符的值
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// 握手完成后到首次发送之间的延迟 (毫秒)
    #[serde(default = "default_connect_settle_delay_ms")]
    pub connect_settle_delay_ms: u64,

    /// 每个连接的出站队列容量
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl HostConfig {
    /// Settle delay as a `Duration`
    pub fn connect_settle_delay(&self) -> Duration {
        Duration::from_millis(self.connect_settle_delay_ms)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_players: default_max_players(),
            connect_settle_delay_ms: default_connect_settle_delay_ms(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_messages() -> Vec<String> {
    vec![DEFAULT_BRAND_MESSAGE.to_string()]
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_send_batch_size() -> usize {
    DEFAULT_SEND_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    DEFAULT_BATCH_DELAY_MS
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> Option<usize> {
    Some(DEFAULT_CACHE_CAPACITY)
}

fn default_listen() -> String {
    "0.0.0.0:25600".to_string()
}

fn default_max_players() -> u32 {
    500
}

fn default_connect_settle_delay_ms() -> u64 {
    100
}

fn default_outbound_queue() -> usize {
    64
}

/// `cache_capacity` as a number or `"unbounded"`
///
/// TOML has no null, so `None` is written as the word. JSON `null` is still
/// accepted on input.
mod cache_capacity {
    use serde::de::{self, Deserializer, Unexpected};
    use serde::{Deserialize, Serializer};

    pub const UNBOUNDED: &str = "unbounded";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bound(usize),
        Word(String),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(capacity) => serializer.serialize_u64(*capacity as u64),
            None => serializer.serialize_str(UNBOUNDED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Bound(capacity)) => Ok(Some(capacity)),
            Some(Raw::Word(word)) if word.eq_ignore_ascii_case(UNBOUNDED) => Ok(None),
            Some(Raw::Word(word)) => Err(de::Error::invalid_value(
                Unexpected::Str(&word),
                &"a positive integer or \"unbounded\"",
            )),
        }
    }
}
