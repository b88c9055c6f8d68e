use crate::{StreamError, StreamMessage, TransformError};
use async_trait::async_trait;
use std::sync::Arc;

/// 消息处理回调：Source 每收到一条消息调用一次。
///
/// Source 必须等待上一次调用完成后再投递下一条（背压）。
/// 返回 `StreamError::SinkUnavailable` 时 Source 应停止拉取。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: StreamMessage) -> Result<(), StreamError>;
}

/// 消息来源。`initialize` / `shutdown` 均可重复调用。
#[async_trait]
pub trait Source: Send + Sync {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError>;

    async fn shutdown(&self) -> Result<(), StreamError>;
}

/// 消息去向。`initialize` / `shutdown` 均可重复调用。
#[async_trait]
pub trait Sink: Send + Sync {
    async fn initialize(&self) -> Result<(), StreamError>;

    async fn write(&self, messages: &[StreamMessage]) -> Result<(), StreamError>;

    async fn shutdown(&self) -> Result<(), StreamError>;
}

/// 单条消息的转换；输出为空表示该消息不产生下游记录。
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(
        &self,
        message: &StreamMessage,
    ) -> Result<Vec<StreamMessage>, TransformError>;

    /// 处理器启动时（Source 之前）调用；重启后恢复转换持有的调度资源。
    async fn initialize(&self) -> Result<(), TransformError> {
        Ok(())
    }

    /// 处理器停止时调用，用于取消转换持有的延迟任务。
    async fn shutdown(&self) {}
}

/// 死信全部写入失败时的终止动作。
pub trait FatalHandler: Send + Sync {
    fn on_fatal(&self, processor: &str, error: &StreamError);
}

/// 默认终止动作：以非零状态码退出进程，由外部编排重启。
#[derive(Debug, Default)]
pub struct ProcessExit;

impl FatalHandler for ProcessExit {
    fn on_fatal(&self, processor: &str, error: &StreamError) {
        tracing::error!(
            target: "mds.stream",
            processor = %processor,
            error = %error,
            "process_exit"
        );
        std::process::exit(1);
    }
}
