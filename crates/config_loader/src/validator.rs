//! 配置规范化与校验模块
//!
//! 规范化 (超出范围的值回退为默认值，并记录调整项)：
//! - messages 为空 -> ["DeepCraft"]
//! - update_interval_ms < 1000 -> 5000
//! - send_batch_size == 0 -> 200
//! - batch_delay_ms < 10 -> 50
//!
//! 校验规则 (硬错误)：
//! - host.listen 为合法 socket 地址
//! - cache_capacity 不为 0
//! - host.outbound_queue > 0

use std::fmt;
use std::net::SocketAddr;

use contracts::{
    ContractError, ServiceConfig, DEFAULT_BATCH_DELAY_MS, DEFAULT_BRAND_MESSAGE,
    DEFAULT_SEND_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL_MS, MIN_BATCH_DELAY_MS,
    MIN_UPDATE_INTERVAL_MS,
};

/// A value replaced during normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    /// Dotted path of the adjusted field
    pub field: &'static str,
    /// Human-readable description of the change
    pub message: String,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 规范化配置，返回所有调整项
pub fn normalize(config: &mut ServiceConfig) -> Vec<Adjustment> {
    let brand = &mut config.brand;
    let mut adjustments = Vec::new();

    if brand.messages.is_empty() {
        brand.messages = vec![DEFAULT_BRAND_MESSAGE.to_string()];
        adjustments.push(Adjustment {
            field: "brand.messages",
            message: format!("empty, using [\"{DEFAULT_BRAND_MESSAGE}\"]"),
        });
    }

    if brand.update_interval_ms < MIN_UPDATE_INTERVAL_MS {
        adjustments.push(Adjustment {
            field: "brand.update_interval_ms",
            message: format!(
                "{} is below {MIN_UPDATE_INTERVAL_MS}, using {DEFAULT_UPDATE_INTERVAL_MS}",
                brand.update_interval_ms
            ),
        });
        brand.update_interval_ms = DEFAULT_UPDATE_INTERVAL_MS;
    }

    if brand.send_batch_size == 0 {
        brand.send_batch_size = DEFAULT_SEND_BATCH_SIZE;
        adjustments.push(Adjustment {
            field: "brand.send_batch_size",
            message: format!("0 is not allowed, using {DEFAULT_SEND_BATCH_SIZE}"),
        });
    }

    if brand.batch_delay_ms < MIN_BATCH_DELAY_MS {
        adjustments.push(Adjustment {
            field: "brand.batch_delay_ms",
            message: format!(
                "{} is below {MIN_BATCH_DELAY_MS}, using {DEFAULT_BATCH_DELAY_MS}",
                brand.batch_delay_ms
            ),
        });
        brand.batch_delay_ms = DEFAULT_BATCH_DELAY_MS;
    }

    adjustments
}

/// 校验 ServiceConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_cache(config)?;
    validate_host(config)?;
    Ok(())
}

/// 校验缓存上限
fn validate_cache(config: &ServiceConfig) -> Result<(), ContractError> {
    if config.brand.cache_capacity == Some(0) {
        return Err(ContractError::config_validation(
            "brand.cache_capacity",
            "cache_capacity must be > 0 (use \"unbounded\" for no limit)",
        ));
    }
    Ok(())
}

/// 校验宿主配置
fn validate_host(config: &ServiceConfig) -> Result<(), ContractError> {
    let host = &config.host;

    if host.listen.parse::<SocketAddr>().is_err() {
        return Err(ContractError::config_validation(
            "host.listen",
            format!("'{}' is not a valid socket address", host.listen),
        ));
    }

    if host.outbound_queue == 0 {
        return Err(ContractError::config_validation(
            "host.outbound_queue",
            "outbound_queue must be > 0",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let mut config = ServiceConfig::default();
        assert!(normalize(&mut config).is_empty());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_normalize_restores_defaults() {
        let mut config = ServiceConfig::default();
        config.brand.messages.clear();
        config.brand.update_interval_ms = 10;
        config.brand.send_batch_size = 0;
        config.brand.batch_delay_ms = 1;

        let adjustments = normalize(&mut config);
        let fields: Vec<_> = adjustments.iter().map(|a| a.field).collect();
        assert_eq!(
            fields,
            vec![
                "brand.messages",
                "brand.update_interval_ms",
                "brand.send_batch_size",
                "brand.batch_delay_ms"
            ]
        );
        assert_eq!(config.brand.messages, vec!["DeepCraft".to_string()]);
        assert_eq!(config.brand.update_interval_ms, 5000);
        assert_eq!(config.brand.send_batch_size, 200);
        assert_eq!(config.brand.batch_delay_ms, 50);
    }

    #[test]
    fn test_normalize_keeps_boundary_values() {
        let mut config = ServiceConfig::default();
        config.brand.update_interval_ms = 1000;
        config.brand.batch_delay_ms = 10;
        config.brand.send_batch_size = 1;
        assert!(normalize(&mut config).is_empty());
        assert_eq!(config.brand.update_interval_ms, 1000);
    }

    #[test]
    fn test_zero_cache_capacity() {
        let mut config = ServiceConfig::default();
        config.brand.cache_capacity = Some(0);
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cache_capacity must be > 0"), "got: {err}");
    }

    #[test]
    fn test_invalid_listen_address() {
        let mut config = ServiceConfig::default();
        config.host.listen = "not-an-address".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("not a valid socket address"), "got: {err}");
    }

    #[test]
    fn test_zero_outbound_queue() {
        let mut config = ServiceConfig::default();
        config.host.outbound_queue = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("outbound_queue"), "got: {err}");
    }
}
