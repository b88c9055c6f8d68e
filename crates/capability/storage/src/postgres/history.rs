//! Postgres 历史表实现
//!
//! 只追加：主键冲突（重复投递）时不更新已有行。

use crate::error::StorageError;
use crate::models::HistoryRecord;
use crate::traits::HistoryStore;
use domain::{DeviceState, RecordKind};
use sqlx::{PgPool, Row};

pub struct PgHistoryStore {
    pub pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn parse_kind(value: &str) -> Result<RecordKind, StorageError> {
    match value {
        "event" => Ok(RecordKind::Event),
        "telemetry" => Ok(RecordKind::Telemetry),
        other => Err(StorageError::new(format!("unknown record_type: {}", other))),
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, state: &DeviceState) -> Result<bool, StorageError> {
        let payload = serde_json::to_string(state)?;
        let result = sqlx::query(
            "insert into device_state_history \
             (provider_id, device_id, ts, record_type, recorded, annotation_version, payload) \
             values ($1, $2, $3, $4, $5, $6, $7::jsonb) \
             on conflict (provider_id, device_id, ts, record_type) do nothing",
        )
        .bind(&state.provider_id)
        .bind(&state.device_id)
        .bind(state.timestamp)
        .bind(state.kind.as_str())
        .bind(state.recorded)
        .bind(state.annotation_version as i32)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_history(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Vec<HistoryRecord>, StorageError> {
        let rows = sqlx::query(
            "select provider_id, device_id, ts, record_type, recorded, annotation_version, \
             payload::text as payload \
             from device_state_history where provider_id = $1 and device_id = $2 \
             order by ts asc, record_type asc",
        )
        .bind(provider_id)
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record_type: String = row.try_get("record_type")?;
            let annotation_version: i32 = row.try_get("annotation_version")?;
            let payload: String = row.try_get("payload")?;
            records.push(HistoryRecord {
                provider_id: row.try_get("provider_id")?,
                device_id: row.try_get("device_id")?,
                timestamp: row.try_get("ts")?,
                kind: parse_kind(&record_type)?,
                recorded: row.try_get("recorded")?,
                annotation_version: u32::try_from(annotation_version)
                    .map_err(|err| StorageError::new(err.to_string()))?,
                state: serde_json::from_str(&payload)?,
            });
        }
        Ok(records)
    }
}
