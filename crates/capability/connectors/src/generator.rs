use crate::task::TaskSlot;
use async_trait::async_trait;
use mds_stream::{MessageHandler, Source, StreamError, StreamMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type Factory = Arc<dyn Fn(u64) -> StreamMessage + Send + Sync>;

/// 进程内生成器 Source：按固定间隔调用工厂函数产生消息。
pub struct GeneratorSource {
    interval: Duration,
    limit: Option<u64>,
    factory: Factory,
    task: TaskSlot,
}

impl GeneratorSource {
    pub fn new(
        interval: Duration,
        limit: Option<u64>,
        factory: impl Fn(u64) -> StreamMessage + Send + Sync + 'static,
    ) -> Self {
        Self {
            interval,
            limit,
            factory: Arc::new(factory),
            task: TaskSlot::new(),
        }
    }

    /// 等待生成结束（仅在设置了条数上限时会自然结束）。
    pub async fn wait(&self) {
        self.task.wait().await;
    }
}

#[async_trait]
impl Source for GeneratorSource {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError> {
        let interval = self.interval;
        let limit = self.limit;
        let factory = self.factory.clone();
        self.task
            .start(move |mut stop| async move {
                let mut ticker = tokio::time::interval(interval);
                let mut sequence = 0u64;
                loop {
                    if limit.is_some_and(|limit| sequence >= limit) {
                        info!(target: "mds.connectors", generated = sequence, "generator_finished");
                        break;
                    }
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = ticker.tick() => {
                            let message = factory(sequence);
                            sequence += 1;
                            match handler.handle(message).await {
                                Ok(()) => {}
                                Err(StreamError::SinkUnavailable) => break,
                                Err(err) => {
                                    warn!(target: "mds.connectors", error = %err, "generator_handler_failed");
                                }
                            }
                        }
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        self.task.stop().await;
        Ok(())
    }
}
