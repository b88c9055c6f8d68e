//! 具体处理器：车辆事件、遥测、指标。
//!
//! 每个处理器都是一个 [`mds_stream::Transform`]，由流处理框架驱动：
//! 解析 → 质量过滤 → 地理标注 → 设备状态更新 → 行程关联 → 历史追加 → 输出。
//! 被质量过滤拒绝的记录不产生输出；解析或存储失败返回错误，由框架转入死信。

mod context;
mod event;
mod labels;
mod metrics;
mod output;
mod telemetry;

pub use context::ProcessorContext;
pub use event::VehicleEventTransform;
pub use labels::{LatencyBucket, geography_label};
pub use metrics::MetricsTransform;
pub use output::{AnnotatedEvent, AnnotatedTelemetry, MetricSample};
pub use telemetry::TelemetryTransform;

use mds_quality::QualityError;
use mds_storage::StorageError;
use mds_stream::TransformError;
use mds_trips::CorrelationError;

/// 处理器错误（都会使原始消息进入死信）。
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ProcessorError> for TransformError {
    fn from(err: ProcessorError) -> Self {
        TransformError::new(err.to_string())
    }
}
