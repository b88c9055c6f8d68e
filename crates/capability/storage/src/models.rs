//! 存储相关数据模型

use domain::{DeviceState, RecordKind};

/// 历史表中的一行。
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub provider_id: String,
    pub device_id: String,
    pub timestamp: i64,
    pub kind: RecordKind,
    pub recorded: i64,
    pub annotation_version: u32,
    pub state: DeviceState,
}

impl HistoryRecord {
    pub fn from_state(state: &DeviceState) -> Self {
        Self {
            provider_id: state.provider_id.clone(),
            device_id: state.device_id.clone(),
            timestamp: state.timestamp,
            kind: state.kind,
            recorded: state.recorded,
            annotation_version: state.annotation_version,
            state: state.clone(),
        }
    }
}
