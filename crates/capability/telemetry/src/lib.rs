//! 追踪与请求 ID 生成。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub scans_total: u64,
    pub scan_failures: u64,
    pub values_emitted: u64,
    pub values_suppressed: u64,
    pub values_dropped: u64,
    pub write_success: u64,
    pub write_retries: u64,
    pub write_losses: u64,
    pub rows_evicted: u64,
    pub status_transitions: u64,
    pub subscriber_overflows: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    scans_total: AtomicU64,
    scan_failures: AtomicU64,
    values_emitted: AtomicU64,
    values_suppressed: AtomicU64,
    values_dropped: AtomicU64,
    write_success: AtomicU64,
    write_retries: AtomicU64,
    write_losses: AtomicU64,
    rows_evicted: AtomicU64,
    status_transitions: AtomicU64,
    subscriber_overflows: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            scans_total: AtomicU64::new(0),
            scan_failures: AtomicU64::new(0),
            values_emitted: AtomicU64::new(0),
            values_suppressed: AtomicU64::new(0),
            values_dropped: AtomicU64::new(0),
            write_success: AtomicU64::new(0),
            write_retries: AtomicU64::new(0),
            write_losses: AtomicU64::new(0),
            rows_evicted: AtomicU64::new(0),
            status_transitions: AtomicU64::new(0),
            subscriber_overflows: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scans_total: self.scans_total.load(Ordering::Relaxed),
            scan_failures: self.scan_failures.load(Ordering::Relaxed),
            values_emitted: self.values_emitted.load(Ordering::Relaxed),
            values_suppressed: self.values_suppressed.load(Ordering::Relaxed),
            values_dropped: self.values_dropped.load(Ordering::Relaxed),
            write_success: self.write_success.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            write_losses: self.write_losses.load(Ordering::Relaxed),
            rows_evicted: self.rows_evicted.load(Ordering::Relaxed),
            status_transitions: self.status_transitions.load(Ordering::Relaxed),
            subscriber_overflows: self.subscriber_overflows.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次标签读取（无论成败）。
pub fn record_scan() {
    metrics().scans_total.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次读取失败（超时或断连）。
pub fn record_scan_failure() {
    metrics().scan_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次值事件发出。
pub fn record_value_emitted() {
    metrics().values_emitted.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次 monitor_changes 抑制（值未变化，未发出）。
pub fn record_value_suppressed() {
    metrics().values_suppressed.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次值事件在满通道上被丢弃（按损失计数，不阻塞读取节拍）。
pub fn record_value_dropped() {
    metrics().values_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次存储写入成功。
pub fn record_write_success() {
    metrics().write_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次存储写入重试。
pub fn record_write_retry() {
    metrics().write_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次写入放弃（重试耗尽，事件按损失计数丢弃）。
pub fn record_write_loss() {
    metrics().write_losses.fetch_add(1, Ordering::Relaxed);
}

/// 记录保留期清扫删除的行数。
pub fn record_rows_evicted(count: u64) {
    metrics().rows_evicted.fetch_add(count, Ordering::Relaxed);
}

/// 记录一次 PLC 状态迁移广播。
pub fn record_status_transition() {
    metrics().status_transitions.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次订阅者溢出断开。
pub fn record_subscriber_overflow() {
    metrics().subscriber_overflows.fetch_add(1, Ordering::Relaxed);
}
