use domain::{
    Annotation, DeviceState, Gps, ProviderQualityMetrics, QualityBucketKind, RecordKind,
    RejectedSample, Telemetry, VehicleEvent, VehicleStatus,
};

fn telemetry(ts: i64) -> Telemetry {
    Telemetry {
        device_id: "device-1".to_string(),
        provider_id: "provider-1".to_string(),
        timestamp: ts,
        gps: Gps::new(34.05, -118.25),
        charge: Some(0.8),
        recorded: ts + 500,
    }
}

fn event(ts: i64, event_type: &str, trip_id: Option<&str>) -> VehicleEvent {
    VehicleEvent {
        device_id: "device-1".to_string(),
        provider_id: "provider-1".to_string(),
        event_type: event_type.to_string(),
        event_type_reason: None,
        trip_id: trip_id.map(str::to_string),
        timestamp: ts,
        telemetry: Some(telemetry(ts)),
        recorded: ts + 500,
    }
}

#[test]
fn newer_record_supersedes_state() {
    let current = DeviceState::from_telemetry(&telemetry(1000), 1, None, None);
    let newer = DeviceState::from_telemetry(&telemetry(1001), 1, None, None);
    let older = DeviceState::from_telemetry(&telemetry(999), 1, None, None);

    assert!(newer.supersedes(&current));
    assert!(!older.supersedes(&current));
}

#[test]
fn trip_event_wins_timestamp_tie() {
    let current = DeviceState::from_telemetry(&telemetry(1000), 1, None, None);
    let trip_event = DeviceState::from_event(
        &event(1000, "trip_start", Some("trip-1")),
        1,
        None,
        Some(VehicleStatus::Trip),
    );
    let plain_event = DeviceState::from_event(
        &event(1000, "battery_low", None),
        1,
        None,
        Some(VehicleStatus::Unavailable),
    );
    let same_telemetry = DeviceState::from_telemetry(&telemetry(1000), 1, None, None);

    assert!(trip_event.supersedes(&current));
    assert!(!plain_event.supersedes(&current));
    assert!(!same_telemetry.supersedes(&current));
}

#[test]
fn embedded_telemetry_inherits_event_ids() {
    let mut raw = event(2000, "trip_start", Some("trip-1"));
    if let Some(sample) = raw.telemetry.as_mut() {
        sample.device_id.clear();
        sample.provider_id.clear();
        sample.recorded = 0;
    }
    let sample = raw.embedded_telemetry().expect("telemetry");
    assert_eq!(sample.device_id, "device-1");
    assert_eq!(sample.provider_id, "provider-1");
    assert_eq!(sample.recorded, 2500);

    let state = DeviceState::from_event(&raw, 3, Some(Annotation::out_of_bound()), None);
    assert_eq!(state.kind, RecordKind::Event);
    assert_eq!(state.gps.as_ref().map(|gps| gps.lat), Some(34.05));
    assert_eq!(state.annotation_version, 3);
}

#[test]
fn quality_metrics_keep_bounded_recent_samples() {
    let mut metrics = ProviderQualityMetrics::default();
    for ts in 0..5 {
        metrics.record(
            QualityBucketKind::Duplicate,
            RejectedSample {
                device_id: "device-1".to_string(),
                timestamp: ts,
                event_type: None,
                reason: "duplicate record".to_string(),
            },
            3,
        );
    }
    let bucket = metrics.bucket(QualityBucketKind::Duplicate);
    assert_eq!(bucket.count, 5);
    assert_eq!(bucket.recent.len(), 3);
    assert_eq!(bucket.recent[0].timestamp, 2);
    assert_eq!(metrics.bucket(QualityBucketKind::Invalid).count, 0);

    let json = serde_json::to_value(&metrics).expect("serialize");
    assert_eq!(json["duplicateEvents"]["count"], 5);
    assert!(json.get("outOfOrderEvents").is_some());
}
