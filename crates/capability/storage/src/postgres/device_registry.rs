//! Postgres 设备参考数据实现

use crate::error::StorageError;
use crate::traits::DeviceRegistry;
use domain::Device;
use sqlx::{PgPool, Row};

pub struct PgDeviceRegistry {
    pub pool: PgPool,
}

impl PgDeviceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl DeviceRegistry for PgDeviceRegistry {
    async fn find_device(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, StorageError> {
        let row = sqlx::query(
            "select device_id, provider_id, vehicle_type, propulsion_types \
             from devices where provider_id = $1 and device_id = $2",
        )
        .bind(provider_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Device {
            device_id: row.try_get("device_id")?,
            provider_id: row.try_get("provider_id")?,
            vehicle_type: row.try_get("vehicle_type")?,
            propulsion_types: row.try_get("propulsion_types")?,
        }))
    }
}
