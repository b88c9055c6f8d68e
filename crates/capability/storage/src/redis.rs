//! Redis hash 缓存实现

use crate::error::StorageError;
use crate::traits::HashStore;
use redis::AsyncCommands;
use std::collections::HashMap;

/// Redis 共享缓存
pub struct RedisHashStore {
    client: redis::Client,
}

impl RedisHashStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_tokio_connection().await?)
    }
}

#[async_trait::async_trait]
impl HashStore for RedisHashStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError> {
        let mut connection = self.connection().await?;
        let data: Option<String> = connection.hget(key, field).await?;
        Ok(data)
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        connection.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        let mut connection = self.connection().await?;
        let data: HashMap<String, String> = connection.hgetall(key).await?;
        Ok(data)
    }
}
