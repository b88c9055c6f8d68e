//! Source / Sink 连接器。
//!
//! - `mqtt`：MQTT 主题（手动 ack，处理完成后才确认）
//! - `file`：按行分隔的文件
//! - `generator`：进程内定时生成
//! - `memory`：内存收集（测试与本地演示）

mod file;
mod generator;
mod memory;
mod mqtt;
mod task;

pub use file::{FileSink, FileSource};
pub use generator::GeneratorSource;
pub use memory::MemorySink;
pub use mqtt::{MqttConnection, MqttSink, MqttSource};
