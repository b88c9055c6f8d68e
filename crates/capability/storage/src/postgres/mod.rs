//! # PostgreSQL 存储实现模块
//!
//! - **HistoryStore** (`history.rs`)：只追加的设备状态历史表，供审计与重处理
//! - **DeviceRegistry** (`device_registry.rs`)：设备参考数据（只读）
//!
//! ## 数据库模式要求
//!
//! - `device_state_history`：主键 (provider_id, device_id, ts, record_type)
//! - `devices`：主键 (provider_id, device_id)
//!
//! 表结构见 `connection::ensure_schema`。所有 SQL 使用参数绑定。

pub mod device_registry;
pub mod history;

pub use device_registry::*;
pub use history::*;
