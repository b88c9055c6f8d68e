use domain::{Annotation, Telemetry, VehicleEvent, VehicleStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 标注后的车辆事件（事件字段平铺）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: VehicleEvent,
    pub vehicle_state: VehicleStatus,
    pub annotation_version: u32,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// 标注后的遥测（遥测字段平铺）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTelemetry {
    #[serde(flatten)]
    pub telemetry: Telemetry,
    pub annotation_version: u32,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// 指标样本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub provider_id: String,
    pub timestamp: i64,
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
