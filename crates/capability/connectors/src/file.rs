//! 按行分隔的文件连接器：每行一条消息（NDJSON）。

use crate::task::TaskSlot;
use async_trait::async_trait;
use mds_stream::{MessageHandler, Sink, Source, StreamError, StreamMessage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 文件 Source：逐行读取，读到文件末尾后结束。
pub struct FileSource {
    path: PathBuf,
    task: TaskSlot,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            task: TaskSlot::new(),
        }
    }

    /// 等待文件读取完毕。
    pub async fn wait(&self) {
        self.task.wait().await;
    }
}

#[async_trait]
impl Source for FileSource {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError> {
        let file = File::open(&self.path)
            .await
            .map_err(|err| StreamError::Connector(format!("{}: {}", self.path.display(), err)))?;
        let path = self.path.clone();
        self.task
            .start(move |mut stop| async move {
                let mut lines = BufReader::new(file).lines();
                let mut delivered = 0u64;
                loop {
                    let line = tokio::select! {
                        _ = stop.changed() => break,
                        line = lines.next_line() => line,
                    };
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(err) => {
                            warn!(target: "mds.connectors", path = %path.display(), error = %err, "file_read_failed");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match handler.handle(StreamMessage::new(line)).await {
                        Ok(()) => delivered += 1,
                        Err(StreamError::SinkUnavailable) => break,
                        Err(err) => {
                            warn!(target: "mds.connectors", path = %path.display(), error = %err, "file_handler_failed");
                        }
                    }
                }
                info!(target: "mds.connectors", path = %path.display(), delivered, "file_source_finished");
            })
            .await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        self.task.stop().await;
        Ok(())
    }
}

/// 文件 Sink：每条消息追加一行。
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    fn io_error(&self, err: std::io::Error) -> StreamError {
        StreamError::Sink(format!("{}: {}", self.path.display(), err))
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn initialize(&self) -> Result<(), StreamError> {
        let mut file = self.file.lock().await;
        if file.is_some() {
            return Ok(());
        }
        let opened = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        *file = Some(opened);
        Ok(())
    }

    async fn write(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| StreamError::Sink(format!("{} not initialized", self.path.display())))?;
        for message in messages {
            let mut line = message.payload.clone();
            line.push(b'\n');
            file.write_all(&line).await.map_err(|err| self.io_error(err))?;
        }
        file.flush().await.map_err(|err| self.io_error(err))
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await.map_err(|err| self.io_error(err))?;
        }
        Ok(())
    }
}
