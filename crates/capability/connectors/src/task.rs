//! 连接器后台任务槽：保证启动/停止可重复调用。

use std::future::Future;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub(crate) struct TaskSlot {
    running: Mutex<Option<Running>>,
}

impl TaskSlot {
    pub(crate) fn new() -> Self {
        Self {
            running: Mutex::new(None),
        }
    }

    /// 启动后台任务；已在运行时返回 `false`。
    pub(crate) async fn start<F, Fut>(&self, run: F) -> bool
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|current| !current.task.is_finished()) {
            return false;
        }
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(stop_rx));
        *running = Some(Running { stop, task });
        true
    }

    /// 通知停止并等待任务退出。
    pub(crate) async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        let _ = running.stop.send(true);
        let _ = running.task.await;
    }

    /// 等待任务自然结束（有限 Source 读完输入）。
    pub(crate) async fn wait(&self) {
        let Some(Running { stop, task }) = self.running.lock().await.take() else {
            return;
        };
        // 发送端必须存活到任务结束，否则任务会把通道关闭当作停止信号
        let _ = task.await;
        drop(stop);
    }
}
