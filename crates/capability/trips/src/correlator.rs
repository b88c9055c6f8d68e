use crate::CorrelationError;
use domain::{DeviceState, TripEvent, TripLog, TripTelemetry, VehicleEventType};
use mds_storage::StateCache;
use tracing::{debug, info};

/// 遥测归属结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationOutcome {
    Appended { trip_id: String },
    AlreadyPresent { trip_id: String },
    /// 没有在该时间点之前开始的行程，遥测被丢弃。
    NoMatchingTrip,
    /// 记录不带定位（如不带遥测的注册事件）。
    NoPosition,
}

/// 为不带 trip_id 的遥测挑选行程：所有 `trip_start`/`trip_enter` 条目中，
/// 时间戳不晚于 `timestamp` 的最大者。时间戳相同时取 trip_id 较小者。
pub fn select_trip(trip_log: &TripLog, timestamp: i64) -> Option<&str> {
    let mut best: Option<(&str, i64)> = None;
    for (trip_id, entries) in trip_log {
        for entry in entries {
            let opens = VehicleEventType::parse(&entry.event_type)
                .is_some_and(|event_type| event_type.opens_trip());
            if !opens || entry.timestamp > timestamp {
                continue;
            }
            if best.is_none_or(|(_, best_ts)| entry.timestamp > best_ts) {
                best = Some((trip_id.as_str(), entry.timestamp));
            }
        }
    }
    best.map(|(trip_id, _)| trip_id)
}

/// 行程关联器（状态全部在共享缓存中）。
#[derive(Clone)]
pub struct TripCorrelator {
    cache: StateCache,
}

impl TripCorrelator {
    pub fn new(cache: StateCache) -> Self {
        Self { cache }
    }

    /// 记录一条行程事件，随后把事件自带的遥测归属到该行程。
    pub async fn record_trip_event(
        &self,
        state: &DeviceState,
    ) -> Result<CorrelationOutcome, CorrelationError> {
        let trip_id = state
            .trip_id
            .clone()
            .ok_or_else(|| CorrelationError::MissingTripId(state.device_key()))?;
        let mut trip_log = self
            .cache
            .get_trip_log(&state.provider_id, &state.device_id)
            .await?;
        let entry = TripEvent {
            timestamp: state.timestamp,
            event_type: state.event_type.clone().unwrap_or_default(),
            event_type_reason: state.event_type_reason.clone(),
            service_area_id: state
                .annotation
                .as_ref()
                .and_then(|annotation| annotation.service_area_id())
                .map(str::to_string),
            district: state
                .annotation
                .as_ref()
                .and_then(|annotation| annotation.district())
                .map(str::to_string),
            gps: state.gps.clone(),
        };
        let entries = trip_log.entry(trip_id.clone()).or_default();
        let exists = entries.iter().any(|existing| {
            existing.timestamp == entry.timestamp && existing.event_type == entry.event_type
        });
        if !exists {
            let index = entries.partition_point(|existing| existing.timestamp <= entry.timestamp);
            entries.insert(index, entry);
            self.cache
                .put_trip_log(&state.provider_id, &state.device_id, &trip_log)
                .await?;
            debug!(
                target: "mds.trips",
                provider_id = %state.provider_id,
                device_id = %state.device_id,
                trip_id = %trip_id,
                "trip_event_recorded"
            );
        }
        self.correlate_telemetry(state).await
    }

    /// 把一条记录的定位写入行程遥测；`(trip_id, timestamp)` 至多写入一次。
    pub async fn correlate_telemetry(
        &self,
        state: &DeviceState,
    ) -> Result<CorrelationOutcome, CorrelationError> {
        let Some(gps) = state.gps.as_ref() else {
            return Ok(CorrelationOutcome::NoPosition);
        };
        let trip_id = match &state.trip_id {
            Some(trip_id) => trip_id.clone(),
            None => {
                let trip_log = self
                    .cache
                    .get_trip_log(&state.provider_id, &state.device_id)
                    .await?;
                match select_trip(&trip_log, state.timestamp) {
                    Some(trip_id) => trip_id.to_string(),
                    None => {
                        info!(
                            target: "mds.trips",
                            provider_id = %state.provider_id,
                            device_id = %state.device_id,
                            timestamp = state.timestamp,
                            "telemetry_unmatched"
                        );
                        mds_telemetry::record_telemetry_unmatched();
                        return Ok(CorrelationOutcome::NoMatchingTrip);
                    }
                }
            }
        };

        let mut points = self
            .cache
            .get_trip_telemetry(&state.provider_id, &state.device_id, &trip_id)
            .await?;
        if points.iter().any(|point| point.timestamp == state.timestamp) {
            return Ok(CorrelationOutcome::AlreadyPresent { trip_id });
        }
        let index = points.partition_point(|point| point.timestamp < state.timestamp);
        points.insert(
            index,
            TripTelemetry {
                timestamp: state.timestamp,
                latitude: gps.lat,
                longitude: gps.lng,
                annotation_version: state.annotation_version,
                annotation: state.annotation.clone(),
            },
        );
        self.cache
            .put_trip_telemetry(&state.provider_id, &state.device_id, &trip_id, &points)
            .await?;
        mds_telemetry::record_telemetry_correlated();
        Ok(CorrelationOutcome::Appended { trip_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(timestamp: i64, event_type: &str) -> TripEvent {
        TripEvent {
            timestamp,
            event_type: event_type.to_string(),
            event_type_reason: None,
            service_area_id: None,
            district: None,
            gps: None,
        }
    }

    #[test]
    fn picks_latest_trip_started_before_timestamp() {
        let mut log = TripLog::new();
        log.insert("A".to_string(), vec![opened(100, "trip_start"), opened(180, "trip_end")]);
        log.insert("B".to_string(), vec![opened(200, "trip_start")]);

        assert_eq!(select_trip(&log, 150), Some("A"));
        assert_eq!(select_trip(&log, 250), Some("B"));
        assert_eq!(select_trip(&log, 200), Some("B"));
        assert_eq!(select_trip(&log, 50), None);
    }

    #[test]
    fn trip_enter_counts_as_start() {
        let mut log = TripLog::new();
        log.insert("A".to_string(), vec![opened(100, "trip_start")]);
        log.insert("B".to_string(), vec![opened(50, "trip_start"), opened(120, "trip_enter")]);
        assert_eq!(select_trip(&log, 130), Some("B"));
        assert_eq!(select_trip(&log, 110), Some("A"));
    }
}
