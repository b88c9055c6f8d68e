use crate::ProcessorError;
use crate::labels::LatencyBucket;
use crate::output::MetricSample;
use async_trait::async_trait;
use mds_stream::{StreamMessage, Transform, TransformError};
use serde::Deserialize;
use std::collections::BTreeMap;

/// 标注后记录中指标处理器关心的字段（事件与遥测共用）。
#[derive(Debug, Deserialize)]
struct AnnotatedView {
    provider_id: String,
    timestamp: i64,
    #[serde(default)]
    recorded: i64,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

/// 指标处理器：每条标注记录输出一个计数样本。
#[derive(Debug, Default)]
pub struct MetricsTransform;

impl MetricsTransform {
    pub fn new() -> Self {
        Self
    }

    pub fn sample(&self, payload: &[u8]) -> Result<MetricSample, ProcessorError> {
        let view: AnnotatedView = serde_json::from_slice(payload)?;
        let mut labels = view.labels;
        let latency = LatencyBucket::from_millis(view.recorded.saturating_sub(view.timestamp));
        labels
            .entry("latency".to_string())
            .or_insert_with(|| latency.to_string());
        let name = match view.event_type {
            Some(event_type) => {
                labels.insert("event_type".to_string(), event_type);
                "vehicle_events"
            }
            None => "telemetry",
        };
        mds_telemetry::record_metric_sample();
        Ok(MetricSample {
            name: name.to_string(),
            provider_id: view.provider_id,
            timestamp: view.timestamp,
            value: 1.0,
            labels,
        })
    }
}

#[async_trait]
impl Transform for MetricsTransform {
    async fn transform(
        &self,
        message: &StreamMessage,
    ) -> Result<Vec<StreamMessage>, TransformError> {
        let sample = self.sample(&message.payload)?;
        let payload = serde_json::to_vec(&sample).map_err(ProcessorError::from)?;
        Ok(vec![StreamMessage {
            key: Some(sample.provider_id),
            payload,
        }])
    }
}
