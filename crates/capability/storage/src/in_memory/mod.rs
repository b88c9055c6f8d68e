//! 内存存储实现模块
//!
//! 用于本地演示和测试，未配置 Redis/Postgres 时也作为回退实现。
//!
//! 包含以下实现：
//! - HashStore: InMemoryHashStore
//! - HistoryStore: InMemoryHistoryStore
//! - DeviceRegistry: InMemoryDeviceRegistry

pub mod device_registry;
pub mod hash;
pub mod history;

pub use device_registry::*;
pub use hash::*;
pub use history::*;
