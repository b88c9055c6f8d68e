use crate::state_machine::VehicleEventType;
use serde::{Deserialize, Serialize};

/// GPS 定位点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Gps {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            speed: None,
            heading: None,
            accuracy: None,
            altitude: None,
        }
    }
}

/// 设备参考数据（外部维护，只读）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub provider_id: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub propulsion_types: Vec<String>,
}

/// 遥测样本（时间戳均为毫秒）。
///
/// 嵌入在事件中的样本可以省略 `device_id`/`provider_id`/`recorded`，
/// 此时沿用所属事件的值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub provider_id: String,
    pub timestamp: i64,
    pub gps: Gps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<f64>,
    #[serde(default)]
    pub recorded: i64,
}

/// 车辆事件。`event_type` 保留原始字符串，未知类型由质量过滤判定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleEvent {
    pub device_id: String,
    pub provider_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    pub recorded: i64,
}

impl VehicleEvent {
    pub fn parsed_event_type(&self) -> Option<VehicleEventType> {
        VehicleEventType::parse(&self.event_type)
    }

    /// 嵌入遥测样本，缺失的标识字段由事件补齐。
    pub fn embedded_telemetry(&self) -> Option<Telemetry> {
        let mut telemetry = self.telemetry.clone()?;
        if telemetry.device_id.is_empty() {
            telemetry.device_id = self.device_id.clone();
        }
        if telemetry.provider_id.is_empty() {
            telemetry.provider_id = self.provider_id.clone();
        }
        if telemetry.recorded == 0 {
            telemetry.recorded = self.recorded;
        }
        Some(telemetry)
    }
}

/// 记录种类（也是历史表主键的一部分）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Event,
    Telemetry,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Event => "event",
            RecordKind::Telemetry => "telemetry",
        }
    }
}

/// 流入处理链路的一条记录。
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Event(VehicleEvent),
    Telemetry(Telemetry),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Event(_) => RecordKind::Event,
            Record::Telemetry(_) => RecordKind::Telemetry,
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            Record::Event(event) => &event.provider_id,
            Record::Telemetry(telemetry) => &telemetry.provider_id,
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Record::Event(event) => &event.device_id,
            Record::Telemetry(telemetry) => &telemetry.device_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Record::Event(event) => event.timestamp,
            Record::Telemetry(telemetry) => telemetry.timestamp,
        }
    }

    pub fn recorded(&self) -> i64 {
        match self {
            Record::Event(event) => event.recorded,
            Record::Telemetry(telemetry) => telemetry.recorded,
        }
    }

    /// 事件的原始类型字符串；遥测为 `None`。
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Record::Event(event) => Some(&event.event_type),
            Record::Telemetry(_) => None,
        }
    }

    /// 设备维度的缓存字段：`provider_id:device_id`。
    pub fn device_key(&self) -> String {
        device_key(self.provider_id(), self.device_id())
    }
}

/// 设备维度缓存字段。
pub fn device_key(provider_id: &str, device_id: &str) -> String {
    format!("{}:{}", provider_id, device_id)
}
