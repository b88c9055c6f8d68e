use async_trait::async_trait;
use domain::{Device, GeographyKind, VehicleStatus};
use mds_connectors::{GeneratorSource, MemorySink};
use mds_geo::{GeoAnnotator, Geography, Polygon};
use mds_processors::{
    AnnotatedEvent, AnnotatedTelemetry, MetricSample, MetricsTransform, ProcessorContext,
    TelemetryTransform, VehicleEventTransform,
};
use mds_storage::{
    HistoryStore, InMemoryDeviceRegistry, InMemoryHashStore, InMemoryHistoryStore, StateCache,
};
use mds_stream::{
    FatalHandler, MessageHandler, Source, StreamError, StreamMessage, StreamProcessor, Transform,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Fixture {
    context: ProcessorContext,
    cache: StateCache,
    history: Arc<InMemoryHistoryStore>,
}

fn fixture() -> Fixture {
    let cache = StateCache::new(Arc::new(InMemoryHashStore::new()));
    let history = Arc::new(InMemoryHistoryStore::new());
    let registry = Arc::new(InMemoryDeviceRegistry::with_devices([Device {
        device_id: "device-1".to_string(),
        provider_id: "provider-1".to_string(),
        vehicle_type: "scooter".to_string(),
        propulsion_types: vec!["electric".to_string()],
    }]));
    let downtown = Polygon::new(
        vec![[-118.3, 34.0], [-118.2, 34.0], [-118.2, 34.1], [-118.3, 34.1]],
        Vec::new(),
    )
    .expect("polygon");
    let annotator = Arc::new(GeoAnnotator::new(
        3,
        vec![Geography::new("sa-1", "Downtown", GeographyKind::ServiceArea, vec![downtown])],
    ));
    let context = ProcessorContext::new(cache.clone(), history.clone(), registry, annotator, 10);
    Fixture {
        context,
        cache,
        history,
    }
}

fn event_payload(ts: i64, event_type: &str, trip_id: Option<&str>) -> StreamMessage {
    let mut event = json!({
        "device_id": "device-1",
        "provider_id": "provider-1",
        "event_type": event_type,
        "timestamp": ts,
        "recorded": ts + 2_000,
        "telemetry": {
            "timestamp": ts,
            "gps": { "lat": 34.05, "lng": -118.25 }
        }
    });
    if let Some(trip_id) = trip_id {
        event["trip_id"] = json!(trip_id);
    }
    StreamMessage::new(event.to_string())
}

fn telemetry_payload(ts: i64, lat: f64, lng: f64) -> StreamMessage {
    StreamMessage::new(
        json!({
            "device_id": "device-1",
            "provider_id": "provider-1",
            "timestamp": ts,
            "recorded": ts + 100,
            "gps": { "lat": lat, "lng": lng },
            "charge": 0.7
        })
        .to_string(),
    )
}

#[tokio::test]
async fn trip_start_is_annotated_and_recorded() {
    let f = fixture();
    let transform = VehicleEventTransform::new(f.context.clone());

    let outputs = transform
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("transform");
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].key.as_deref(), Some("provider-1:device-1"));

    let annotated: AnnotatedEvent = serde_json::from_slice(&outputs[0].payload).expect("decode");
    assert_eq!(annotated.vehicle_state, VehicleStatus::Trip);
    assert_eq!(annotated.annotation_version, 3);
    assert_eq!(annotated.labels["vehicle_type"], "scooter");
    assert_eq!(annotated.labels["geography"], "Downtown");
    assert_eq!(annotated.labels["latency"], "1s_5s");
    assert_eq!(annotated.labels["vehicle_state"], "trip");

    let state = f
        .cache
        .get_device_state("provider-1", "device-1")
        .await
        .expect("state")
        .expect("cached");
    assert_eq!(state.vehicle_status, Some(VehicleStatus::Trip));
    assert_eq!(state.annotation_version, 3);
    assert_eq!(f.history.len(), 1);

    let log = f.cache.get_trip_log("provider-1", "device-1").await.expect("log");
    assert_eq!(log["trip-1"][0].service_area_id.as_deref(), Some("sa-1"));
}

#[tokio::test]
async fn redelivered_event_is_dropped_without_new_history() {
    let f = fixture();
    let transform = VehicleEventTransform::new(f.context.clone());
    let message = event_payload(1_000, "trip_start", Some("trip-1"));

    assert_eq!(transform.transform(&message).await.expect("first").len(), 1);
    assert!(transform.transform(&message).await.expect("again").is_empty());
    assert_eq!(f.history.len(), 1);

    let metrics = f.cache.get_provider_metrics("provider-1").await.expect("metrics");
    assert_eq!(metrics.duplicate_events.count, 1);
}

#[tokio::test]
async fn illegal_transition_and_unknown_trip_are_rejected() {
    let f = fixture();
    let transform = VehicleEventTransform::new(f.context.clone());

    assert!(
        transform
            .transform(&event_payload(500, "trip_end", Some("ghost")))
            .await
            .expect("out of order")
            .is_empty()
    );
    transform
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("start");
    assert!(
        transform
            .transform(&event_payload(2_000, "reservation_start", None))
            .await
            .expect("illegal")
            .is_empty()
    );

    let metrics = f.cache.get_provider_metrics("provider-1").await.expect("metrics");
    assert_eq!(metrics.out_of_order_events.count, 1);
    assert_eq!(metrics.invalid_events.count, 1);
    let state = f
        .cache
        .get_device_state("provider-1", "device-1")
        .await
        .expect("state")
        .expect("cached");
    assert_eq!(state.event_type.as_deref(), Some("trip_start"));
}

#[tokio::test]
async fn malformed_payload_is_a_transform_failure() {
    let f = fixture();
    let transform = VehicleEventTransform::new(f.context.clone());
    let err = transform
        .transform(&StreamMessage::new("{not json"))
        .await
        .expect_err("decode");
    assert!(err.to_string().starts_with("payload decode error"));

    let telemetry = TelemetryTransform::new(f.context.clone(), Duration::from_millis(10));
    let err = telemetry
        .transform(&StreamMessage::new(
            json!({"provider_id": "provider-1", "timestamp": 1, "gps": {"lat": 0.0, "lng": 0.0}})
                .to_string(),
        ))
        .await
        .expect_err("missing device");
    assert_eq!(err.to_string(), "missing field: device_id");
}

#[tokio::test]
async fn telemetry_carries_status_and_correlates_after_grace() {
    let f = fixture();
    let events = VehicleEventTransform::new(f.context.clone());
    let telemetry = TelemetryTransform::new(f.context.clone(), Duration::from_millis(20));

    events
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("start");
    let outputs = telemetry
        .transform(&telemetry_payload(1_500, 40.0, -100.0))
        .await
        .expect("telemetry");
    let annotated: AnnotatedTelemetry =
        serde_json::from_slice(&outputs[0].payload).expect("decode");
    assert_eq!(annotated.labels["geography"], "out_of_bound");
    assert_eq!(annotated.annotation.as_ref().map(|a| a.in_bound), Some(false));

    let state = f
        .cache
        .get_device_state("provider-1", "device-1")
        .await
        .expect("state")
        .expect("cached");
    assert_eq!(state.vehicle_status, Some(VehicleStatus::Trip));
    assert_eq!(state.timestamp, 1_500);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let points = f
        .cache
        .get_trip_telemetry("provider-1", "device-1", "trip-1")
        .await
        .expect("points");
    assert_eq!(
        points.iter().map(|point| point.timestamp).collect::<Vec<_>>(),
        vec![1_000, 1_500]
    );
    let rows = f
        .history
        .list_history("provider-1", "device-1")
        .await
        .expect("history");
    assert_eq!(rows.len(), 2);
    telemetry.shutdown().await;
}

#[tokio::test]
async fn metrics_sample_reflects_annotated_event() {
    let f = fixture();
    let events = VehicleEventTransform::new(f.context.clone());
    let outputs = events
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("start");

    let metrics = MetricsTransform::new();
    let samples = metrics.transform(&outputs[0]).await.expect("sample");
    let sample: MetricSample = serde_json::from_slice(&samples[0].payload).expect("decode");
    assert_eq!(sample.name, "vehicle_events");
    assert_eq!(sample.provider_id, "provider-1");
    assert_eq!(sample.value, 1.0);
    assert_eq!(sample.labels["event_type"], "trip_start");
    assert_eq!(sample.labels["geography"], "Downtown");
    assert_eq!(samples[0].key.as_deref(), Some("provider-1"));
}

struct NeverFatal;

impl FatalHandler for NeverFatal {
    fn on_fatal(&self, processor: &str, error: &StreamError) {
        panic!("{} hit fatal error: {}", processor, error);
    }
}

#[tokio::test]
async fn processor_routes_bad_input_to_dead_letter() {
    let f = fixture();
    let inputs = vec![
        event_payload(1_000, "trip_start", Some("trip-1")),
        StreamMessage::new("garbage"),
        event_payload(2_000, "trip_end", Some("trip-1")),
    ];
    let source = Arc::new(GeneratorSource::new(
        Duration::from_millis(1),
        Some(inputs.len() as u64),
        move |seq| inputs[seq as usize].clone(),
    ));
    let annotated = Arc::new(MemorySink::new());
    let dead_letter = Arc::new(MemorySink::new());
    let processor = StreamProcessor::builder(
        "events",
        source.clone(),
        Arc::new(VehicleEventTransform::new(f.context.clone())),
    )
    .sink(annotated.clone())
    .dead_letter_sink(dead_letter.clone())
    .fatal_handler(Arc::new(NeverFatal))
    .build();

    processor.start().await.expect("start");
    source.wait().await;
    processor.stop().await;

    assert_eq!(annotated.len().await, 2);
    let dead = dead_letter.messages().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].payload_text(), "garbage");
    let state = f
        .cache
        .get_device_state("provider-1", "device-1")
        .await
        .expect("state")
        .expect("cached");
    assert_eq!(state.vehicle_status, Some(VehicleStatus::Available));
}

#[tokio::test]
async fn telemetry_matching_event_timestamp_is_duplicate() {
    let f = fixture();
    let events = VehicleEventTransform::new(f.context.clone());
    let telemetry = TelemetryTransform::new(f.context.clone(), Duration::from_millis(10));

    events
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("start");
    let outputs = telemetry
        .transform(&telemetry_payload(1_000, 34.05, -118.25))
        .await
        .expect("telemetry");
    assert!(outputs.is_empty());
    assert_eq!(f.history.len(), 1);

    let metrics = f.cache.get_provider_metrics("provider-1").await.expect("metrics");
    assert_eq!(metrics.duplicate_events.count, 1);
    telemetry.shutdown().await;
}

#[tokio::test]
async fn extreme_timestamps_saturate_latency() {
    let f = fixture();
    let telemetry = TelemetryTransform::new(f.context.clone(), Duration::from_millis(10));
    let message = StreamMessage::new(
        json!({
            "device_id": "device-1",
            "provider_id": "provider-1",
            "timestamp": i64::MIN,
            "recorded": 0,
            "gps": { "lat": 34.05, "lng": -118.25 }
        })
        .to_string(),
    );

    let outputs = telemetry.transform(&message).await.expect("telemetry");
    let annotated: AnnotatedTelemetry =
        serde_json::from_slice(&outputs[0].payload).expect("decode");
    assert_eq!(annotated.labels["latency"], "gt_5m");

    let samples = MetricsTransform::new()
        .transform(&outputs[0])
        .await
        .expect("sample");
    let sample: MetricSample = serde_json::from_slice(&samples[0].payload).expect("decode");
    assert_eq!(sample.labels["latency"], "gt_5m");
    telemetry.shutdown().await;
}

/// 测试中手动投递消息的 Source。
#[derive(Default)]
struct HeldSource {
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
}

impl HeldSource {
    async fn deliver(&self, message: StreamMessage) {
        let handler = self
            .handler
            .lock()
            .expect("handler")
            .clone()
            .expect("source initialized");
        handler.handle(message).await.expect("handled");
    }
}

#[async_trait]
impl Source for HeldSource {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError> {
        *self.handler.lock().expect("handler") = Some(handler);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        self.handler.lock().expect("handler").take();
        Ok(())
    }
}

#[tokio::test]
async fn telemetry_correlates_after_processor_restart() {
    let f = fixture();
    let events = VehicleEventTransform::new(f.context.clone());
    let source = Arc::new(HeldSource::default());
    let annotated = Arc::new(MemorySink::new());
    let processor = StreamProcessor::builder(
        "telemetry",
        source.clone(),
        Arc::new(TelemetryTransform::new(
            f.context.clone(),
            Duration::from_millis(20),
        )),
    )
    .sink(annotated.clone())
    .dead_letter_sink(Arc::new(MemorySink::new()))
    .fatal_handler(Arc::new(NeverFatal))
    .build();

    processor.start().await.expect("start");
    processor.stop().await;
    processor.start().await.expect("restart");

    events
        .transform(&event_payload(1_000, "trip_start", Some("trip-1")))
        .await
        .expect("start event");
    source.deliver(telemetry_payload(1_500, 34.05, -118.25)).await;
    assert_eq!(annotated.len().await, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let points = f
        .cache
        .get_trip_telemetry("provider-1", "device-1", "trip-1")
        .await
        .expect("points");
    assert_eq!(
        points.iter().map(|point| point.timestamp).collect::<Vec<_>>(),
        vec![1_000, 1_500]
    );
    processor.stop().await;
}
