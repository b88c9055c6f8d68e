//! 裸遥测的延迟关联。
//!
//! 遥测与事件来自不同主题，到达顺序互不保证。裸遥测在宽限期后再做
//! 关联，给同时到达的 `trip_start` 先写入行程日志的机会。延迟任务可取消，
//! 处理器停止时统一中止并回收。

use crate::{CorrelationOutcome, TripCorrelator};
use domain::DeviceState;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

struct Pending {
    tasks: JoinSet<()>,
    closed: bool,
}

/// 延迟关联调度器。
pub struct DeferredCorrelator {
    correlator: TripCorrelator,
    delay: Duration,
    pending: Mutex<Pending>,
}

impl DeferredCorrelator {
    pub fn new(correlator: TripCorrelator, delay: Duration) -> Self {
        Self {
            correlator,
            delay,
            pending: Mutex::new(Pending {
                tasks: JoinSet::new(),
                closed: false,
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 宽限期后关联该遥测；调度器已关闭时返回 `false`。
    pub async fn schedule(&self, state: DeviceState) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.closed {
            warn!(
                target: "mds.trips",
                device_key = %state.device_key(),
                "deferred_correlation_closed"
            );
            return false;
        }
        while pending.tasks.try_join_next().is_some() {}

        let correlator = self.correlator.clone();
        let delay = self.delay;
        pending.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            match correlator.correlate_telemetry(&state).await {
                Ok(CorrelationOutcome::Appended { trip_id }) => {
                    debug!(
                        target: "mds.trips",
                        device_key = %state.device_key(),
                        trip_id = %trip_id,
                        "telemetry_correlated"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    mds_telemetry::record_correlation_failure();
                    warn!(
                        target: "mds.trips",
                        device_key = %state.device_key(),
                        timestamp = state.timestamp,
                        error = %err,
                        "deferred_correlation_failed"
                    );
                }
            }
        });
        true
    }

    /// 重新接受调度（处理器重启时调用）。
    pub async fn open(&self) {
        self.pending.lock().await.closed = false;
    }

    /// 尚未完成的延迟任务数。
    pub async fn pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        while pending.tasks.try_join_next().is_some() {}
        pending.tasks.len()
    }

    /// 中止全部未完成任务并等待回收；`open` 之前的调度请求被拒绝。可重复调用。
    pub async fn shutdown(&self) {
        let mut pending = self.pending.lock().await;
        pending.closed = true;
        let outstanding = pending.tasks.len();
        pending.tasks.abort_all();
        while pending.tasks.join_next().await.is_some() {}
        if outstanding > 0 {
            debug!(target: "mds.trips", outstanding, "deferred_correlation_cancelled");
        }
    }
}
