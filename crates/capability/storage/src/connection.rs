//! 数据库连接管理
//!
//! - connect_pool：建立 Postgres 连接池
//! - ensure_schema：创建历史表与设备参考表（幂等）

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const SCHEMA: [&str; 3] = [
    "create table if not exists device_state_history (\
        provider_id text not null, \
        device_id text not null, \
        ts bigint not null, \
        record_type text not null, \
        recorded bigint not null, \
        annotation_version integer not null, \
        payload jsonb not null, \
        inserted_at timestamptz not null default now(), \
        primary key (provider_id, device_id, ts, record_type))",
    "create table if not exists devices (\
        provider_id text not null, \
        device_id text not null, \
        vehicle_type text not null, \
        propulsion_types text[] not null default '{}', \
        primary key (provider_id, device_id))",
    "create index if not exists idx_device_state_history_recorded \
        on device_state_history (provider_id, recorded)",
];

/// 建立 Postgres 连接池（最大连接数 8）。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// 创建本模块依赖的表（已存在则跳过）。
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
