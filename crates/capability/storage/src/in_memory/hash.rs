//! 共享缓存内存实现

use crate::error::StorageError;
use crate::traits::HashStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// hash 缓存内存存储
///
/// 使用 RwLock + HashMap；单次 hget/hset 是原子的，读改写序列不是。
#[derive(Default)]
pub struct InMemoryHashStore {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定 hash 的字段数量（用于测试）
    pub fn field_count(&self, key: &str) -> usize {
        self.hashes
            .read()
            .map(|map| map.get(key).map(HashMap::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl HashStore for InMemoryHashStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError> {
        let hashes = self
            .hashes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(hashes.get(key).and_then(|hash| hash.get(field)).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StorageError> {
        let mut hashes = self
            .hashes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        let hashes = self
            .hashes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(hashes.get(key).cloned().unwrap_or_default())
    }
}
