//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
///
/// 全部键都有默认值，服务可零配置启动（注册表为空，带内存存储后端）。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 单次标签读取的操作超时（毫秒），越过视为 ReadTimeout。
    pub read_timeout_ms: u64,
    /// 连续失败阈值：达到后 PLC 进入 offline/error。
    pub failure_threshold: u32,
    /// 存储写入的最大重试次数（之后按损失丢弃）。
    pub write_max_retries: u32,
    /// 重试退避基准（毫秒，逐次指数放大）。
    pub write_backoff_ms: u64,
    /// 保留期清扫间隔（秒）。
    pub retention_sweep_interval_s: u64,
    /// 每个状态订阅者的有界队列长度（溢出即断开）。
    pub subscriber_buffer: usize,
    /// 值事件通道容量（调度器 → 存储路由）。
    pub value_channel_capacity: usize,
    /// 健康信号通道容量（调度器 → 状态广播器）。
    pub health_channel_capacity: usize,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("PLCDASH_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let read_timeout_ms = read_u64_with_default("PLCDASH_READ_TIMEOUT_MS", 2_000)?;
        let failure_threshold = read_u32_with_default("PLCDASH_FAILURE_THRESHOLD", 3)?;
        let write_max_retries = read_u32_with_default("PLCDASH_WRITE_MAX_RETRIES", 3)?;
        let write_backoff_ms = read_u64_with_default("PLCDASH_WRITE_BACKOFF_MS", 50)?;
        let retention_sweep_interval_s =
            read_u64_with_default("PLCDASH_RETENTION_SWEEP_INTERVAL_S", 60)?;
        let subscriber_buffer = read_usize_with_default("PLCDASH_SUBSCRIBER_BUFFER", 64)?;
        let value_channel_capacity = read_usize_with_default("PLCDASH_VALUE_CHANNEL_CAPACITY", 1_024)?;
        let health_channel_capacity =
            read_usize_with_default("PLCDASH_HEALTH_CHANNEL_CAPACITY", 1_024)?;

        let config = Self {
            http_addr,
            read_timeout_ms,
            failure_threshold,
            write_max_retries,
            write_backoff_ms,
            retention_sweep_interval_s,
            subscriber_buffer,
            value_channel_capacity,
            health_channel_capacity,
        };
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "PLCDASH_READ_TIMEOUT_MS".to_string(),
                "0".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "PLCDASH_FAILURE_THRESHOLD".to_string(),
                "0".to_string(),
            ));
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid(
                "PLCDASH_SUBSCRIBER_BUFFER".to_string(),
                "0".to_string(),
            ));
        }
        Ok(self)
    }
}

impl Default for AppConfig {
    /// 测试与零配置启动用的默认值（与 from_env 的缺省一致）。
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8080".to_string(),
            read_timeout_ms: 2_000,
            failure_threshold: 3,
            write_max_retries: 3,
            write_backoff_ms: 50,
            retention_sweep_interval_s: 60,
            subscriber_buffer: 64,
            value_channel_capacity: 1_024,
            health_channel_capacity: 1_024,
        }
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
