use crate::ProcessorError;
use crate::labels::{LatencyBucket, geography_label};
use domain::{Annotation, DeviceState};
use mds_geo::GeoAnnotator;
use mds_quality::QualityFilter;
use mds_storage::{DeviceRegistry, HistoryStore, StateCache};
use mds_trips::TripCorrelator;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 处理器共享的协作者。
#[derive(Clone)]
pub struct ProcessorContext {
    pub cache: StateCache,
    pub history: Arc<dyn HistoryStore>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub annotator: Arc<GeoAnnotator>,
    pub quality: QualityFilter,
    pub correlator: TripCorrelator,
}

impl ProcessorContext {
    pub fn new(
        cache: StateCache,
        history: Arc<dyn HistoryStore>,
        registry: Arc<dyn DeviceRegistry>,
        annotator: Arc<GeoAnnotator>,
        quality_recent_limit: usize,
    ) -> Self {
        Self {
            quality: QualityFilter::new(cache.clone(), quality_recent_limit),
            correlator: TripCorrelator::new(cache.clone()),
            cache,
            history,
            registry,
            annotator,
        }
    }

    /// 更新设备状态（仅当候选状态可替换当前状态）并追加历史。
    pub(crate) async fn apply(
        &self,
        candidate: &DeviceState,
        current: Option<&DeviceState>,
    ) -> Result<(), ProcessorError> {
        if current.is_none_or(|current| candidate.supersedes(current)) {
            self.cache.put_device_state(candidate).await?;
        } else {
            debug!(
                target: "mds.processors",
                device_key = %candidate.device_key(),
                timestamp = candidate.timestamp,
                "device_state_kept"
            );
        }
        if !self.history.append(candidate).await? {
            debug!(
                target: "mds.processors",
                device_key = %candidate.device_key(),
                timestamp = candidate.timestamp,
                "history_already_present"
            );
        }
        let latency = candidate.recorded.saturating_sub(candidate.timestamp).max(0);
        mds_telemetry::record_ingest_latency_ms(latency as u64);
        Ok(())
    }

    /// 输出标签：车型、地理、上报延迟。车型查询失败只记录日志。
    pub(crate) async fn labels(
        &self,
        provider_id: &str,
        device_id: &str,
        annotation: Option<&Annotation>,
        latency_ms: i64,
    ) -> BTreeMap<String, String> {
        let vehicle_type = match self.registry.find_device(provider_id, device_id).await {
            Ok(Some(device)) => device.vehicle_type,
            Ok(None) => "unknown".to_string(),
            Err(err) => {
                warn!(
                    target: "mds.processors",
                    provider_id = %provider_id,
                    device_id = %device_id,
                    error = %err,
                    "device_lookup_failed"
                );
                "unknown".to_string()
            }
        };
        let mut labels = BTreeMap::new();
        labels.insert("vehicle_type".to_string(), vehicle_type);
        labels.insert("geography".to_string(), geography_label(annotation));
        labels.insert(
            "latency".to_string(),
            LatencyBucket::from_millis(latency_ms).to_string(),
        );
        labels
    }
}
