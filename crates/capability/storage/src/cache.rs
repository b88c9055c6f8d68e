//! 派生状态缓存（类型化封装）
//!
//! 在 [`HashStore`] 之上按固定键布局读写设备状态、行程日志、
//! 行程遥测与供应商质量指标。所有 `put_*` 都是整值覆盖，
//! 读改写的非原子性见 [`HashStore`] 说明。

use crate::error::StorageError;
use crate::keys::{
    DEVICE_STATE_KEY, PROVIDER_STATE_KEY, TRIP_STATE_KEY, device_field, trip_telemetry_key,
};
use crate::traits::HashStore;
use domain::{DeviceState, ProviderQualityMetrics, TripLog, TripTelemetry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Clone)]
pub struct StateCache {
    store: Arc<dyn HashStore>,
}

impl StateCache {
    pub fn new(store: Arc<dyn HashStore>) -> Self {
        Self { store }
    }

    pub async fn get_device_state(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Option<DeviceState>, StorageError> {
        self.get_json(DEVICE_STATE_KEY, &device_field(provider_id, device_id))
            .await
    }

    pub async fn put_device_state(&self, state: &DeviceState) -> Result<(), StorageError> {
        self.put_json(DEVICE_STATE_KEY, &state.device_key(), state)
            .await
    }

    /// 全部设备的最新状态（供看板等外部消费者读取）
    pub async fn list_device_states(&self) -> Result<Vec<DeviceState>, StorageError> {
        let entries = self.store.hgetall(DEVICE_STATE_KEY).await?;
        let mut states = Vec::with_capacity(entries.len());
        for value in entries.into_values() {
            states.push(serde_json::from_str(&value)?);
        }
        states.sort_by(|a: &DeviceState, b: &DeviceState| a.device_key().cmp(&b.device_key()));
        Ok(states)
    }

    /// 设备行程日志；不存在时返回空表
    pub async fn get_trip_log(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<TripLog, StorageError> {
        Ok(self
            .get_json(TRIP_STATE_KEY, &device_field(provider_id, device_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn put_trip_log(
        &self,
        provider_id: &str,
        device_id: &str,
        log: &TripLog,
    ) -> Result<(), StorageError> {
        self.put_json(TRIP_STATE_KEY, &device_field(provider_id, device_id), log)
            .await
    }

    /// 某段行程已归属的遥测点；不存在时返回空列表
    pub async fn get_trip_telemetry(
        &self,
        provider_id: &str,
        device_id: &str,
        trip_id: &str,
    ) -> Result<Vec<TripTelemetry>, StorageError> {
        Ok(self
            .get_json(&trip_telemetry_key(provider_id, device_id), trip_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn put_trip_telemetry(
        &self,
        provider_id: &str,
        device_id: &str,
        trip_id: &str,
        points: &[TripTelemetry],
    ) -> Result<(), StorageError> {
        self.put_json(&trip_telemetry_key(provider_id, device_id), trip_id, points)
            .await
    }

    pub async fn get_provider_metrics(
        &self,
        provider_id: &str,
    ) -> Result<ProviderQualityMetrics, StorageError> {
        Ok(self
            .get_json(PROVIDER_STATE_KEY, provider_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn put_provider_metrics(
        &self,
        provider_id: &str,
        metrics: &ProviderQualityMetrics,
    ) -> Result<(), StorageError> {
        self.put_json(PROVIDER_STATE_KEY, provider_id, metrics).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>, StorageError> {
        let Some(data) = self.store.hget(key, field).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn put_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_string(value)?;
        self.store.hset(key, field, data).await
    }
}
