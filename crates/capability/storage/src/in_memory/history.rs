//! 历史表内存实现
//!
//! 仅用于本地测试和占位。

use crate::error::StorageError;
use crate::models::HistoryRecord;
use crate::traits::HistoryStore;
use domain::DeviceState;
use std::collections::BTreeMap;
use std::sync::RwLock;

type HistoryKey = (String, String, i64, &'static str);

/// 历史记录内存存储
#[derive(Default)]
pub struct InMemoryHistoryStore {
    rows: RwLock<BTreeMap<HistoryKey, HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前累计的记录数量（用于测试）
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, state: &DeviceState) -> Result<bool, StorageError> {
        let key = (
            state.provider_id.clone(),
            state.device_id.clone(),
            state.timestamp,
            state.kind.as_str(),
        );
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, HistoryRecord::from_state(state));
        Ok(true)
    }

    async fn list_history(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Vec<HistoryRecord>, StorageError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rows
            .values()
            .filter(|row| row.provider_id == provider_id && row.device_id == device_id)
            .cloned()
            .collect())
    }
}
