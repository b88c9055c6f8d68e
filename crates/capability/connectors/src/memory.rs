use async_trait::async_trait;
use mds_stream::{Sink, StreamError, StreamMessage};
use tokio::sync::Mutex;

/// 内存 Sink：按写入顺序保存全部消息。
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<StreamMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<StreamMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn initialize(&self) -> Result<(), StreamError> {
        Ok(())
    }

    async fn write(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        self.messages.lock().await.extend_from_slice(messages);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        Ok(())
    }
}
