//! 缓存键布局（与传输无关）
//!
//! - `device:state`：field = `provider_id:device_id`，value = DeviceState JSON
//! - `trip:state`：field = `provider_id:device_id`，value = `trip_id → 事件列表` JSON
//! - `device:{provider_id}:{device_id}:trips`：field = `trip_id`，value = 遥测点数组 JSON
//! - `provider:state`：field = `provider_id`，value = 质量指标 JSON

pub const DEVICE_STATE_KEY: &str = "device:state";
pub const TRIP_STATE_KEY: &str = "trip:state";
pub const PROVIDER_STATE_KEY: &str = "provider:state";

pub fn device_field(provider_id: &str, device_id: &str) -> String {
    domain::device_key(provider_id, device_id)
}

pub fn trip_telemetry_key(provider_id: &str, device_id: &str) -> String {
    format!("device:{}:{}:trips", provider_id, device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_telemetry_key_layout() {
        assert_eq!(trip_telemetry_key("p-1", "d-1"), "device:p-1:d-1:trips");
        assert_eq!(device_field("p-1", "d-1"), "p-1:d-1");
    }
}
