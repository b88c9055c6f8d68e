pub mod data;
pub mod state;
pub mod state_machine;

pub use data::{Device, Gps, Record, RecordKind, Telemetry, VehicleEvent, device_key};
pub use state::{
    Annotation, DeviceState, GeographyKind, GeographyRef, ProviderQualityMetrics, QualityBucket,
    QualityBucketKind, RejectedSample, TripEvent, TripLog, TripTelemetry,
};
pub use state_machine::{VehicleEventType, VehicleStatus, next_state, status_for};
