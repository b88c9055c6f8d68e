//! 默认终止动作在子进程中执行：死信全部失败时进程以状态码 1 退出。

use async_trait::async_trait;
use mds_stream::{
    MessageHandler, Source, StreamError, StreamMessage, StreamProcessor, Transform, TransformError,
};
use std::process::Command;
use std::sync::{Arc, Mutex};

const CHILD_ENV: &str = "MDS_STREAM_EXIT_CHILD";

#[derive(Default)]
struct HeldSource {
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
}

#[async_trait]
impl Source for HeldSource {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError> {
        *self.handler.lock().expect("handler") = Some(handler);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        self.handler.lock().expect("handler").take();
        Ok(())
    }
}

struct Rejecting;

#[async_trait]
impl Transform for Rejecting {
    async fn transform(
        &self,
        _message: &StreamMessage,
    ) -> Result<Vec<StreamMessage>, TransformError> {
        Err(TransformError::new("unparseable"))
    }
}

/// 只在子进程中运行：未配置死信 Sink，转换失败即触发默认终止动作。
#[tokio::test]
async fn default_fatal_handler_child() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    let source = Arc::new(HeldSource::default());
    let processor = StreamProcessor::builder("exit-child", source.clone(), Arc::new(Rejecting))
        .build();
    processor.start().await.expect("start");
    let handler = source
        .handler
        .lock()
        .expect("handler")
        .clone()
        .expect("initialized");
    let _ = handler.handle(StreamMessage::new("bad")).await;
    // 默认终止动作未退出时以 0 结束，父进程断言失败
    std::process::exit(0);
}

#[test]
fn unavailable_dead_letter_exits_with_status_one() {
    let exe = std::env::current_exe().expect("test binary");
    let status = Command::new(exe)
        .args(["--exact", "default_fatal_handler_child", "--nocapture"])
        .env(CHILD_ENV, "1")
        .status()
        .expect("spawn child");
    assert_eq!(status.code(), Some(1));
}
