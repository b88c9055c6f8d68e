//! 行程关联：维护设备行程日志，并把遥测点归属到行程。

mod correlator;
mod deferred;

pub use correlator::{CorrelationOutcome, TripCorrelator, select_trip};
pub use deferred::DeferredCorrelator;

use mds_storage::StorageError;

/// 行程关联错误。
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("trip cache error: {0}")]
    Storage(#[from] StorageError),
    #[error("trip event without trip_id: {0}")]
    MissingTripId(String),
}
