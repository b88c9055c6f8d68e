//! 数据质量过滤。
//!
//! 对每条记录按固定顺序检查，命中即返回：
//! 1. 完整性：事件缺少遥测（策略允许的除外）、行程事件缺少 trip_id
//! 2. 重复：与缓存状态时间戳相同且种类/事件类型相同
//! 3. 非法：未知事件类型，或状态机不允许当前状态下发生该事件
//! 4. 乱序：行程延续事件引用了设备行程日志中不存在的 trip_id
//!
//! 被拒绝的记录计入供应商质量指标（共享缓存上的读改写，非原子）。

use domain::{
    DeviceState, ProviderQualityMetrics, QualityBucketKind, Record, RecordKind, RejectedSample,
    TripLog, VehicleEvent, VehicleEventType, VehicleStatus, next_state,
};
use mds_storage::{StateCache, StorageError};
use std::fmt;
use tracing::warn;

/// 非法记录的具体原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidCause {
    MissingTelemetry,
    MissingTripId,
    UnknownEventType(String),
    IllegalTransition {
        from: VehicleStatus,
        event: VehicleEventType,
    },
}

impl fmt::Display for InvalidCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidCause::MissingTelemetry => f.write_str("missing telemetry"),
            InvalidCause::MissingTripId => f.write_str("missing trip_id"),
            InvalidCause::UnknownEventType(event) => write!(f, "unknown event type {}", event),
            InvalidCause::IllegalTransition { from, event } => {
                write!(f, "event {} not allowed in state {}", event, from)
            }
        }
    }
}

/// 记录被拒绝的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    DuplicateRecord,
    InvalidRecord(InvalidCause),
    OutOfOrderRecord { trip_id: String },
}

impl RejectReason {
    pub fn bucket(&self) -> QualityBucketKind {
        match self {
            RejectReason::DuplicateRecord => QualityBucketKind::Duplicate,
            RejectReason::InvalidRecord(_) => QualityBucketKind::Invalid,
            RejectReason::OutOfOrderRecord { .. } => QualityBucketKind::OutOfOrder,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DuplicateRecord => f.write_str("duplicate record"),
            RejectReason::InvalidRecord(cause) => write!(f, "invalid record: {}", cause),
            RejectReason::OutOfOrderRecord { trip_id } => {
                write!(f, "out of order record: unknown trip {}", trip_id)
            }
        }
    }
}

/// 检查结论：`Ok(())` 表示接受。
pub type Verdict = Result<(), Vec<RejectReason>>;

/// 质量过滤错误（缓存读写失败）。
#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    #[error("quality cache error: {0}")]
    Storage(#[from] StorageError),
}

/// 检查 1~3（不依赖行程日志）。
pub fn precheck(record: &Record, state: Option<&DeviceState>) -> Verdict {
    match record {
        Record::Event(event) => precheck_event(event, state),
        Record::Telemetry(telemetry) => {
            if let Some(state) = state {
                if state.timestamp == telemetry.timestamp {
                    return reject(RejectReason::DuplicateRecord);
                }
            }
            Ok(())
        }
    }
}

fn precheck_event(event: &VehicleEvent, state: Option<&DeviceState>) -> Verdict {
    let parsed = event.parsed_event_type();

    // 1. 完整性
    let telemetry_optional = parsed.is_some_and(|event_type| event_type.telemetry_optional());
    if event.telemetry.is_none() && !telemetry_optional {
        return reject(RejectReason::InvalidRecord(InvalidCause::MissingTelemetry));
    }
    if parsed.is_some_and(|event_type| event_type.is_trip_event()) && event.trip_id.is_none() {
        return reject(RejectReason::InvalidRecord(InvalidCause::MissingTripId));
    }

    // 2. 重复
    if let Some(state) = state {
        if state.timestamp == event.timestamp
            && state.kind == RecordKind::Event
            && state.event_type.as_deref() == Some(event.event_type.as_str())
        {
            return reject(RejectReason::DuplicateRecord);
        }
    }

    // 3. 非法
    let Some(event_type) = parsed else {
        return reject(RejectReason::InvalidRecord(InvalidCause::UnknownEventType(
            event.event_type.clone(),
        )));
    };
    if let Some(current) = state.and_then(|state| state.vehicle_status) {
        if next_state(current, event_type).is_none() {
            return reject(RejectReason::InvalidRecord(
                InvalidCause::IllegalTransition {
                    from: current,
                    event: event_type,
                },
            ));
        }
    }
    Ok(())
}

/// 检查 4：行程延续事件必须引用已知行程。
pub fn check_trip_order(event: &VehicleEvent, trip_log: &TripLog) -> Verdict {
    let continues = event
        .parsed_event_type()
        .is_some_and(|event_type| event_type.continues_trip());
    if !continues {
        return Ok(());
    }
    match event.trip_id.as_deref() {
        Some(trip_id) if trip_log.contains_key(trip_id) => Ok(()),
        Some(trip_id) => reject(RejectReason::OutOfOrderRecord {
            trip_id: trip_id.to_string(),
        }),
        None => reject(RejectReason::InvalidRecord(InvalidCause::MissingTripId)),
    }
}

/// 需要读取行程日志才能判定的事件。
fn needs_trip_log(record: &Record) -> bool {
    match record {
        Record::Event(event) => event
            .parsed_event_type()
            .is_some_and(|event_type| event_type.continues_trip()),
        Record::Telemetry(_) => false,
    }
}

fn reject(reason: RejectReason) -> Verdict {
    Err(vec![reason])
}

/// 质量过滤器（读取行程日志，写入供应商质量指标）。
#[derive(Clone)]
pub struct QualityFilter {
    cache: StateCache,
    recent_limit: usize,
}

impl QualityFilter {
    pub fn new(cache: StateCache, recent_limit: usize) -> Self {
        Self {
            cache,
            recent_limit,
        }
    }

    /// 判定一条记录；被拒绝时同时更新供应商质量指标。
    pub async fn check(
        &self,
        record: &Record,
        state: Option<&DeviceState>,
    ) -> Result<Verdict, QualityError> {
        let mut verdict = precheck(record, state);
        if verdict.is_ok() && needs_trip_log(record) {
            if let Record::Event(event) = record {
                let trip_log = self
                    .cache
                    .get_trip_log(&event.provider_id, &event.device_id)
                    .await?;
                verdict = check_trip_order(event, &trip_log);
            }
        }
        if let Err(reasons) = &verdict {
            self.record_rejections(record, reasons).await?;
        }
        Ok(verdict)
    }

    async fn record_rejections(
        &self,
        record: &Record,
        reasons: &[RejectReason],
    ) -> Result<(), QualityError> {
        let provider_id = record.provider_id();
        let mut metrics: ProviderQualityMetrics =
            self.cache.get_provider_metrics(provider_id).await?;
        for reason in reasons {
            warn!(
                target: "mds.quality",
                provider_id = %provider_id,
                device_id = %record.device_id(),
                kind = record.kind().as_str(),
                timestamp = record.timestamp(),
                event_type = record.event_type().unwrap_or("-"),
                reason = %reason,
                "record_rejected"
            );
            match reason.bucket() {
                QualityBucketKind::Duplicate => mds_telemetry::record_rejected_duplicate(),
                QualityBucketKind::Invalid => mds_telemetry::record_rejected_invalid(),
                QualityBucketKind::OutOfOrder => mds_telemetry::record_rejected_out_of_order(),
            }
            metrics.record(
                reason.bucket(),
                RejectedSample {
                    device_id: record.device_id().to_string(),
                    timestamp: record.timestamp(),
                    event_type: record.event_type().map(str::to_string),
                    reason: reason.to_string(),
                },
                self.recent_limit,
            );
        }
        self.cache
            .put_provider_metrics(provider_id, &metrics)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Gps, Telemetry};

    fn telemetry(ts: i64) -> Telemetry {
        Telemetry {
            device_id: "device-1".to_string(),
            provider_id: "provider-1".to_string(),
            timestamp: ts,
            gps: Gps::new(1.0, 1.0),
            charge: None,
            recorded: ts,
        }
    }

    fn event(ts: i64, event_type: &str, trip_id: Option<&str>, with_telemetry: bool) -> VehicleEvent {
        VehicleEvent {
            device_id: "device-1".to_string(),
            provider_id: "provider-1".to_string(),
            event_type: event_type.to_string(),
            event_type_reason: None,
            trip_id: trip_id.map(str::to_string),
            timestamp: ts,
            telemetry: with_telemetry.then(|| telemetry(ts)),
            recorded: ts,
        }
    }

    fn event_state(ts: i64, event_type: &str, status: VehicleStatus) -> DeviceState {
        DeviceState::from_event(&event(ts, event_type, Some("trip-1"), true), 1, None, Some(status))
    }

    #[test]
    fn event_without_telemetry_is_invalid_unless_optional() {
        let verdict = precheck(&Record::Event(event(1, "trip_start", Some("t"), false)), None);
        assert_eq!(
            verdict,
            Err(vec![RejectReason::InvalidRecord(InvalidCause::MissingTelemetry)])
        );
        assert!(precheck(&Record::Event(event(1, "register", None, false)), None).is_ok());
        assert!(precheck(&Record::Event(event(1, "comms_lost", None, false)), None).is_ok());
    }

    #[test]
    fn trip_event_without_trip_id_is_invalid() {
        let verdict = precheck(&Record::Event(event(1, "trip_cancel", None, true)), None);
        assert_eq!(
            verdict,
            Err(vec![RejectReason::InvalidRecord(InvalidCause::MissingTripId)])
        );
    }

    #[test]
    fn duplicate_matches_timestamp_and_event_type() {
        let cached = event_state(100, "trip_start", VehicleStatus::Trip);
        let same = Record::Event(event(100, "trip_start", Some("trip-1"), true));
        assert_eq!(
            precheck(&same, Some(&cached)),
            Err(vec![RejectReason::DuplicateRecord])
        );

        // 同一时间戳、不同事件类型不是重复
        let different = Record::Event(event(100, "trip_end", Some("trip-1"), true));
        assert!(precheck(&different, Some(&cached)).is_ok());

        // 遥测只比较时间戳：事件内嵌的同时刻遥测已被接受过
        assert_eq!(
            precheck(&Record::Telemetry(telemetry(100)), Some(&cached)),
            Err(vec![RejectReason::DuplicateRecord])
        );

        let cached_telemetry = DeviceState::from_telemetry(&telemetry(100), 1, None, None);
        assert_eq!(
            precheck(&Record::Telemetry(telemetry(100)), Some(&cached_telemetry)),
            Err(vec![RejectReason::DuplicateRecord])
        );
    }

    #[test]
    fn unknown_event_type_is_invalid() {
        let verdict = precheck(&Record::Event(event(1, "teleport", None, true)), None);
        assert_eq!(
            verdict,
            Err(vec![RejectReason::InvalidRecord(
                InvalidCause::UnknownEventType("teleport".to_string())
            )])
        );
    }

    #[test]
    fn state_machine_is_enforced_against_cached_status() {
        let cached = event_state(100, "trip_start", VehicleStatus::Trip);
        let verdict = precheck(
            &Record::Event(event(200, "reservation_start", None, true)),
            Some(&cached),
        );
        assert_eq!(
            verdict,
            Err(vec![RejectReason::InvalidRecord(
                InvalidCause::IllegalTransition {
                    from: VehicleStatus::Trip,
                    event: VehicleEventType::ReservationStart,
                }
            )])
        );

        // 首次见到设备：只查状态映射，不做转移校验
        assert!(precheck(&Record::Event(event(200, "trip_end", Some("t"), true)), None).is_ok());
    }

    #[test]
    fn continuing_trip_event_needs_known_trip() {
        let mut trip_log = TripLog::new();
        trip_log.insert("trip-1".to_string(), Vec::new());

        assert!(check_trip_order(&event(1, "trip_end", Some("trip-1"), true), &trip_log).is_ok());
        assert_eq!(
            check_trip_order(&event(1, "trip_leave", Some("trip-2"), true), &trip_log),
            Err(vec![RejectReason::OutOfOrderRecord {
                trip_id: "trip-2".to_string()
            }])
        );
        assert!(check_trip_order(&event(1, "trip_start", Some("trip-9"), true), &trip_log).is_ok());
    }
}
