//! # MDS Storage 模块
//!
//! 流处理核心依赖的存储抽象与实现。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`HashStore` 共享缓存、`HistoryStore` 历史表、
//!    `DeviceRegistry` 设备参考数据
//! 2. **类型化缓存** (`cache.rs`)：`StateCache` 按固定键布局 (`keys.rs`) 读写
//!    设备状态、行程日志、行程遥测、供应商质量指标
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **连接管理层** (`connection.rs`)：Postgres 连接池与建表
//! 5. **实现层**：
//!    - `in_memory/`：内存实现（测试与无外部依赖运行）
//!    - `redis.rs`：Redis hash 缓存
//!    - `postgres/`：历史表与设备参考数据
//!
//! ## 一致性约束
//!
//! 缓存在所有处理器实例间共享、无分布式锁，读改写非原子。
//! 同一设备的键必须由同一消费者处理（上游按设备/供应商分区）；
//! 跨设备共享的供应商质量计数只保证最终近似正确。

pub mod cache;
pub mod connection;
pub mod error;
pub mod in_memory;
pub mod keys;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod traits;

pub use cache::StateCache;
pub use connection::*;
pub use error::*;
pub use models::*;
pub use crate::redis::RedisHashStore;
pub use traits::*;

pub use in_memory::{InMemoryDeviceRegistry, InMemoryHashStore, InMemoryHistoryStore};

pub use postgres::{PgDeviceRegistry, PgHistoryStore};
