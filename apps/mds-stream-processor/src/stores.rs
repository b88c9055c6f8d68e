//! 存储装配：Redis / Postgres 可选，未配置时使用内存实现。

use mds_config::AppConfig;
use mds_storage::{
    DeviceRegistry, HistoryStore, InMemoryDeviceRegistry, InMemoryHashStore, InMemoryHistoryStore,
    PgDeviceRegistry, PgHistoryStore, RedisHashStore, StateCache, StorageError, connect_pool,
    ensure_schema,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Stores {
    pub cache: StateCache,
    pub history: Arc<dyn HistoryStore>,
    pub registry: Arc<dyn DeviceRegistry>,
}

pub async fn connect(config: &AppConfig) -> Result<Stores, StorageError> {
    let cache = match config.redis_url.as_deref() {
        Some(url) => {
            info!(target: "mds.app", "cache_backend_redis");
            StateCache::new(Arc::new(RedisHashStore::connect(url)?))
        }
        None => {
            warn!(target: "mds.app", "cache_backend_in_memory");
            StateCache::new(Arc::new(InMemoryHashStore::new()))
        }
    };

    let (history, registry): (Arc<dyn HistoryStore>, Arc<dyn DeviceRegistry>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = connect_pool(url).await?;
                ensure_schema(&pool).await?;
                info!(target: "mds.app", "history_backend_postgres");
                (
                    Arc::new(PgHistoryStore::new(pool.clone())),
                    Arc::new(PgDeviceRegistry::new(pool)),
                )
            }
            None => {
                warn!(target: "mds.app", "history_backend_in_memory");
                (
                    Arc::new(InMemoryHistoryStore::new()),
                    Arc::new(InMemoryDeviceRegistry::new()),
                )
            }
        };

    Ok(Stores {
        cache,
        history,
        registry,
    })
}
