//! 流处理框架：`Source → Transform → [Sinks]`，转换失败时写入死信 Sink。
//!
//! - `connector`：Source / Sink / Transform 契约
//! - `processor`：处理器生命周期与逐条消息调度

mod connector;
mod processor;

pub use connector::{FatalHandler, MessageHandler, ProcessExit, Sink, Source, Transform};
pub use processor::{ProcessorState, StreamProcessor, StreamProcessorBuilder};

use std::borrow::Cow;

/// 流上的一条消息：可选分区键 + 原始字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl StreamMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
        }
    }

    pub fn with_key(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Some(key.into()),
            payload: payload.into(),
        }
    }

    /// 载荷文本（非 UTF-8 字节按替换字符显示，仅用于日志）。
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// 单条消息转换失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 流处理错误。
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("connector error: {0}")]
    Connector(String),
    #[error("transform failure: {0}")]
    Transform(#[from] TransformError),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("sink unavailable: every dead-letter sink failed")]
    SinkUnavailable,
    #[error("invalid processor state: {0}")]
    InvalidState(String),
}
