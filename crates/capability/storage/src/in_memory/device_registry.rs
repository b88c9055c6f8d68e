//! 设备参考数据内存实现

use crate::error::StorageError;
use crate::traits::DeviceRegistry;
use domain::{Device, device_key};
use std::collections::HashMap;
use std::sync::RwLock;

/// 设备参考数据内存存储
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定设备列表初始化
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let map = devices
            .into_iter()
            .map(|device| (device_key(&device.provider_id, &device.device_id), device))
            .collect();
        Self {
            devices: RwLock::new(map),
        }
    }

    pub fn insert(&self, device: Device) -> Result<(), StorageError> {
        let mut devices = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        devices.insert(device_key(&device.provider_id, &device.device_id), device);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn find_device(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, StorageError> {
        let devices = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(devices.get(&device_key(provider_id, device_id)).cloned())
    }
}
