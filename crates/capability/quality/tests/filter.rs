use domain::{
    DeviceState, Gps, QualityBucketKind, Record, Telemetry, TripEvent, TripLog, VehicleEvent,
    VehicleStatus,
};
use mds_quality::{QualityFilter, RejectReason};
use mds_storage::{InMemoryHashStore, StateCache};
use std::sync::Arc;

fn event(ts: i64, event_type: &str, trip_id: &str) -> VehicleEvent {
    VehicleEvent {
        device_id: "device-1".to_string(),
        provider_id: "provider-1".to_string(),
        event_type: event_type.to_string(),
        event_type_reason: None,
        trip_id: Some(trip_id.to_string()),
        timestamp: ts,
        telemetry: Some(Telemetry {
            device_id: String::new(),
            provider_id: String::new(),
            timestamp: ts,
            gps: Gps::new(34.0, -118.0),
            charge: None,
            recorded: 0,
        }),
        recorded: ts + 20,
    }
}

fn filter(limit: usize) -> (QualityFilter, StateCache) {
    let cache = StateCache::new(Arc::new(InMemoryHashStore::new()));
    (QualityFilter::new(cache.clone(), limit), cache)
}

#[tokio::test]
async fn out_of_order_trip_end_is_rejected_and_counted() {
    let (filter, cache) = filter(10);
    let record = Record::Event(event(500, "trip_end", "trip-x"));

    let verdict = filter.check(&record, None).await.expect("check");
    assert_eq!(
        verdict,
        Err(vec![RejectReason::OutOfOrderRecord {
            trip_id: "trip-x".to_string()
        }])
    );

    let metrics = cache.get_provider_metrics("provider-1").await.expect("metrics");
    let bucket = metrics.bucket(QualityBucketKind::OutOfOrder);
    assert_eq!(bucket.count, 1);
    assert_eq!(bucket.recent[0].event_type.as_deref(), Some("trip_end"));
    assert_eq!(bucket.recent[0].device_id, "device-1");
}

#[tokio::test]
async fn known_trip_continuation_is_accepted() {
    let (filter, cache) = filter(10);
    let mut log = TripLog::new();
    log.insert(
        "trip-1".to_string(),
        vec![TripEvent {
            timestamp: 100,
            event_type: "trip_start".to_string(),
            event_type_reason: None,
            service_area_id: None,
            district: None,
            gps: None,
        }],
    );
    cache
        .put_trip_log("provider-1", "device-1", &log)
        .await
        .expect("log");
    let current = DeviceState::from_event(
        &event(100, "trip_start", "trip-1"),
        1,
        None,
        Some(VehicleStatus::Trip),
    );

    let verdict = filter
        .check(&Record::Event(event(200, "trip_end", "trip-1")), Some(&current))
        .await
        .expect("check");
    assert!(verdict.is_ok());
    let metrics = cache.get_provider_metrics("provider-1").await.expect("metrics");
    assert_eq!(metrics.out_of_order_events.count, 0);
}

#[tokio::test]
async fn redelivered_record_counts_as_duplicate_each_time() {
    let (filter, cache) = filter(1);
    let first = event(100, "trip_start", "trip-1");
    let state = DeviceState::from_event(&first, 1, None, Some(VehicleStatus::Trip));
    let record = Record::Event(first);

    for _ in 0..3 {
        let verdict = filter.check(&record, Some(&state)).await.expect("check");
        assert_eq!(verdict, Err(vec![RejectReason::DuplicateRecord]));
    }

    let metrics = cache.get_provider_metrics("provider-1").await.expect("metrics");
    assert_eq!(metrics.duplicate_events.count, 3);
    assert_eq!(metrics.duplicate_events.recent.len(), 1);
}
