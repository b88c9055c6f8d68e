//! 存储接口 Trait 定义
//!
//! - HashStore：共享键值缓存（hash 结构），设备状态/行程/质量指标都落在这里
//! - HistoryStore：只追加的历史表
//! - DeviceRegistry：设备参考数据（只读）
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::HistoryRecord;
use async_trait::async_trait;
use domain::{Device, DeviceState};
use std::collections::HashMap;

/// 共享 hash 缓存接口
///
/// 多个处理器实例共享同一份缓存，且不使用分布式锁：调用方基于
/// `hget` → 修改 → `hset` 的读改写**不是原子的**。正确性依赖上游按
/// 设备/供应商分区，保证同一设备的键同一时刻只被一个消费者修改；
/// 质量计数等跨设备共享的值只保证最终近似正确。
#[async_trait]
pub trait HashStore: Send + Sync {
    /// 读取 hash 中的单个字段
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError>;

    /// 写入（覆盖）hash 中的单个字段
    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), StorageError>;

    /// 读取整个 hash
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError>;
}

/// 历史记录存储接口
///
/// 每条被接受并完成标注的设备状态追加一行，主键
/// `(provider_id, device_id, timestamp, type)`；重复投递不会产生新行。
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加一条记录，返回是否真正插入（主键冲突时为 false）
    async fn append(&self, state: &DeviceState) -> Result<bool, StorageError>;

    /// 按时间升序列出设备的历史记录
    async fn list_history(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Vec<HistoryRecord>, StorageError>;
}

/// 设备参考数据接口（由外部系统维护）
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn find_device(
        &self,
        provider_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, StorageError>;
}
