//! 日志初始化与进程级指标。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_emitted: u64,
    pub transform_failure: u64,
    pub dead_lettered: u64,
    pub dead_letter_failure: u64,
    pub sink_write_failure: u64,
    pub accepted_events: u64,
    pub accepted_telemetry: u64,
    pub rejected_duplicate: u64,
    pub rejected_invalid: u64,
    pub rejected_out_of_order: u64,
    pub telemetry_correlated: u64,
    pub telemetry_unmatched: u64,
    pub correlation_failure: u64,
    pub metric_samples: u64,
    pub ingest_latency_ms_total: u64,
    pub ingest_latency_ms_count: u64,
}

/// 进程级计数器（无锁）。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    messages_emitted: AtomicU64,
    transform_failure: AtomicU64,
    dead_lettered: AtomicU64,
    dead_letter_failure: AtomicU64,
    sink_write_failure: AtomicU64,
    accepted_events: AtomicU64,
    accepted_telemetry: AtomicU64,
    rejected_duplicate: AtomicU64,
    rejected_invalid: AtomicU64,
    rejected_out_of_order: AtomicU64,
    telemetry_correlated: AtomicU64,
    telemetry_unmatched: AtomicU64,
    correlation_failure: AtomicU64,
    metric_samples: AtomicU64,
    ingest_latency_ms_total: AtomicU64,
    ingest_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_emitted: AtomicU64::new(0),
            transform_failure: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            dead_letter_failure: AtomicU64::new(0),
            sink_write_failure: AtomicU64::new(0),
            accepted_events: AtomicU64::new(0),
            accepted_telemetry: AtomicU64::new(0),
            rejected_duplicate: AtomicU64::new(0),
            rejected_invalid: AtomicU64::new(0),
            rejected_out_of_order: AtomicU64::new(0),
            telemetry_correlated: AtomicU64::new(0),
            telemetry_unmatched: AtomicU64::new(0),
            correlation_failure: AtomicU64::new(0),
            metric_samples: AtomicU64::new(0),
            ingest_latency_ms_total: AtomicU64::new(0),
            ingest_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_emitted: self.messages_emitted.load(Ordering::Relaxed),
            transform_failure: self.transform_failure.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dead_letter_failure: self.dead_letter_failure.load(Ordering::Relaxed),
            sink_write_failure: self.sink_write_failure.load(Ordering::Relaxed),
            accepted_events: self.accepted_events.load(Ordering::Relaxed),
            accepted_telemetry: self.accepted_telemetry.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_out_of_order: self.rejected_out_of_order.load(Ordering::Relaxed),
            telemetry_correlated: self.telemetry_correlated.load(Ordering::Relaxed),
            telemetry_unmatched: self.telemetry_unmatched.load(Ordering::Relaxed),
            correlation_failure: self.correlation_failure.load(Ordering::Relaxed),
            metric_samples: self.metric_samples.load(Ordering::Relaxed),
            ingest_latency_ms_total: self.ingest_latency_ms_total.load(Ordering::Relaxed),
            ingest_latency_ms_count: self.ingest_latency_ms_count.load(Ordering::Relaxed),
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

/// 生成消息级追踪 ID。
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录 Source 投递的消息数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入主 Sink 的输出消息数。
pub fn record_messages_emitted(count: u64) {
    metrics().messages_emitted.fetch_add(count, Ordering::Relaxed);
}

/// 记录 Transform 失败次数。
pub fn record_transform_failure() {
    metrics().transform_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功写入死信的消息数。
pub fn record_dead_lettered() {
    metrics().dead_lettered.fetch_add(1, Ordering::Relaxed);
}

/// 记录单个死信 Sink 写入失败次数。
pub fn record_dead_letter_failure() {
    metrics().dead_letter_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录主 Sink 写入失败次数。
pub fn record_sink_write_failure() {
    metrics().sink_write_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录通过质量过滤的事件。
pub fn record_accepted_event() {
    metrics().accepted_events.fetch_add(1, Ordering::Relaxed);
}

/// 记录通过质量过滤的遥测。
pub fn record_accepted_telemetry() {
    metrics().accepted_telemetry.fetch_add(1, Ordering::Relaxed);
}

/// 记录重复记录拒绝次数。
pub fn record_rejected_duplicate() {
    metrics().rejected_duplicate.fetch_add(1, Ordering::Relaxed);
}

/// 记录非法记录拒绝次数。
pub fn record_rejected_invalid() {
    metrics().rejected_invalid.fetch_add(1, Ordering::Relaxed);
}

/// 记录乱序记录拒绝次数。
pub fn record_rejected_out_of_order() {
    metrics().rejected_out_of_order.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功归属到行程的遥测。
pub fn record_telemetry_correlated() {
    metrics().telemetry_correlated.fetch_add(1, Ordering::Relaxed);
}

/// 记录找不到行程而丢弃的遥测。
pub fn record_telemetry_unmatched() {
    metrics().telemetry_unmatched.fetch_add(1, Ordering::Relaxed);
}

/// 记录延迟关联任务失败次数。
pub fn record_correlation_failure() {
    metrics().correlation_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录指标处理器输出的样本数。
pub fn record_metric_sample() {
    metrics().metric_samples.fetch_add(1, Ordering::Relaxed);
}

/// 记录上报延迟（recorded - timestamp，毫秒）。
pub fn record_ingest_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .ingest_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .ingest_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
