//! 派生状态：设备最新状态、行程日志、行程遥测、供应商质量指标。

use crate::data::{Gps, RecordKind, Telemetry, VehicleEvent};
use crate::state_machine::VehicleStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 地理区域类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyKind {
    ServiceArea,
    District,
    Other,
}

/// 标注结果中引用的地理区域。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyRef {
    pub id: String,
    pub name: String,
    pub kind: GeographyKind,
}

/// 点位的地理归属标注。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub in_bound: bool,
    pub areas: Vec<GeographyRef>,
}

impl Annotation {
    pub fn out_of_bound() -> Self {
        Self::default()
    }

    pub fn service_area_id(&self) -> Option<&str> {
        self.first_of(GeographyKind::ServiceArea)
    }

    pub fn district(&self) -> Option<&str> {
        self.first_of(GeographyKind::District)
    }

    fn first_of(&self, kind: GeographyKind) -> Option<&str> {
        self.areas
            .iter()
            .find(|area| area.kind == kind)
            .map(|area| area.id.as_str())
    }
}

/// 设备最新已接受记录（带标注与解析后的车辆状态）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub provider_id: String,
    pub device_id: String,
    pub timestamp: i64,
    pub recorded: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<Gps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<f64>,
    pub annotation_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_status: Option<VehicleStatus>,
}

impl DeviceState {
    pub fn from_event(
        event: &VehicleEvent,
        annotation_version: u32,
        annotation: Option<Annotation>,
        vehicle_status: Option<VehicleStatus>,
    ) -> Self {
        let telemetry = event.embedded_telemetry();
        Self {
            kind: RecordKind::Event,
            provider_id: event.provider_id.clone(),
            device_id: event.device_id.clone(),
            timestamp: event.timestamp,
            recorded: event.recorded,
            event_type: Some(event.event_type.clone()),
            event_type_reason: event.event_type_reason.clone(),
            trip_id: event.trip_id.clone(),
            gps: telemetry.as_ref().map(|sample| sample.gps.clone()),
            charge: telemetry.and_then(|sample| sample.charge),
            annotation_version,
            annotation,
            vehicle_status,
        }
    }

    pub fn from_telemetry(
        telemetry: &Telemetry,
        annotation_version: u32,
        annotation: Option<Annotation>,
        vehicle_status: Option<VehicleStatus>,
    ) -> Self {
        Self {
            kind: RecordKind::Telemetry,
            provider_id: telemetry.provider_id.clone(),
            device_id: telemetry.device_id.clone(),
            timestamp: telemetry.timestamp,
            recorded: telemetry.recorded,
            event_type: None,
            event_type_reason: None,
            trip_id: None,
            gps: Some(telemetry.gps.clone()),
            charge: telemetry.charge,
            annotation_version,
            annotation,
            vehicle_status,
        }
    }

    pub fn device_key(&self) -> String {
        crate::data::device_key(&self.provider_id, &self.device_id)
    }

    /// 单调替换规则：时间戳严格更大，或相等且自身是携带 trip_id 的事件。
    pub fn supersedes(&self, current: &DeviceState) -> bool {
        if self.timestamp > current.timestamp {
            return true;
        }
        self.timestamp == current.timestamp
            && self.kind == RecordKind::Event
            && self.trip_id.is_some()
    }
}

/// 行程日志中的一条事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub timestamp: i64,
    pub event_type: String,
    #[serde(default)]
    pub event_type_reason: Option<String>,
    #[serde(default)]
    pub service_area_id: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub gps: Option<Gps>,
}

/// 单设备的行程日志：`trip_id → 按时间排序的事件列表`。
pub type TripLog = BTreeMap<String, Vec<TripEvent>>;

/// 归属到某段行程的遥测点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripTelemetry {
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub annotation_version: u32,
    #[serde(default)]
    pub annotation: Option<Annotation>,
}

/// 被拒绝记录的分类桶。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityBucketKind {
    Duplicate,
    Invalid,
    OutOfOrder,
}

/// 被拒绝记录样本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSample {
    pub device_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub event_type: Option<String>,
    pub reason: String,
}

/// 单个分类桶：累计计数 + 最近样本（有界）。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityBucket {
    pub count: u64,
    #[serde(default)]
    pub recent: Vec<RejectedSample>,
}

impl QualityBucket {
    fn push(&mut self, sample: RejectedSample, recent_limit: usize) {
        self.count = self.count.saturating_add(1);
        if recent_limit == 0 {
            return;
        }
        self.recent.push(sample);
        if self.recent.len() > recent_limit {
            let overflow = self.recent.len() - recent_limit;
            self.recent.drain(..overflow);
        }
    }
}

/// 供应商数据质量指标（只增不减，重置由外部管理操作完成）。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQualityMetrics {
    #[serde(default)]
    pub duplicate_events: QualityBucket,
    #[serde(default)]
    pub invalid_events: QualityBucket,
    #[serde(default)]
    pub out_of_order_events: QualityBucket,
}

impl ProviderQualityMetrics {
    pub fn record(&mut self, kind: QualityBucketKind, sample: RejectedSample, recent_limit: usize) {
        self.bucket_mut(kind).push(sample, recent_limit);
    }

    pub fn bucket(&self, kind: QualityBucketKind) -> &QualityBucket {
        match kind {
            QualityBucketKind::Duplicate => &self.duplicate_events,
            QualityBucketKind::Invalid => &self.invalid_events,
            QualityBucketKind::OutOfOrder => &self.out_of_order_events,
        }
    }

    fn bucket_mut(&mut self, kind: QualityBucketKind) -> &mut QualityBucket {
        match kind {
            QualityBucketKind::Duplicate => &mut self.duplicate_events,
            QualityBucketKind::Invalid => &mut self.invalid_events,
            QualityBucketKind::OutOfOrder => &mut self.out_of_order_events,
        }
    }
}
