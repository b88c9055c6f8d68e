use crate::ProcessorError;
use crate::context::ProcessorContext;
use crate::output::AnnotatedEvent;
use async_trait::async_trait;
use domain::{
    DeviceState, Record, VehicleEvent, VehicleEventType, VehicleStatus, next_state, status_for,
};
use mds_stream::{StreamMessage, Transform, TransformError};
use tracing::debug;

/// 车辆事件处理器。
pub struct VehicleEventTransform {
    context: ProcessorContext,
}

impl VehicleEventTransform {
    pub fn new(context: ProcessorContext) -> Self {
        Self { context }
    }

    /// 处理一条事件；被拒绝时返回 `None`。
    pub async fn process(
        &self,
        event: VehicleEvent,
    ) -> Result<Option<AnnotatedEvent>, ProcessorError> {
        let ctx = &self.context;
        let current = ctx
            .cache
            .get_device_state(&event.provider_id, &event.device_id)
            .await?;
        let record = Record::Event(event.clone());
        if ctx.quality.check(&record, current.as_ref()).await?.is_err() {
            return Ok(None);
        }
        let Some(event_type) = event.parsed_event_type() else {
            return Ok(None);
        };

        let annotation = event
            .embedded_telemetry()
            .map(|telemetry| ctx.annotator.annotate(&telemetry.gps));
        let vehicle_state = resolve_status(current.as_ref(), event_type);
        let state = DeviceState::from_event(
            &event,
            ctx.annotator.version(),
            annotation.clone(),
            Some(vehicle_state),
        );
        ctx.apply(&state, current.as_ref()).await?;

        if event_type.is_trip_event() {
            let outcome = ctx.correlator.record_trip_event(&state).await?;
            debug!(
                target: "mds.processors",
                device_key = %state.device_key(),
                outcome = ?outcome,
                "trip_event_correlated"
            );
        }
        mds_telemetry::record_accepted_event();

        let mut labels = ctx
            .labels(
                &event.provider_id,
                &event.device_id,
                annotation.as_ref(),
                event.recorded.saturating_sub(event.timestamp),
            )
            .await;
        labels.insert("vehicle_state".to_string(), vehicle_state.to_string());
        Ok(Some(AnnotatedEvent {
            event,
            vehicle_state,
            annotation_version: ctx.annotator.version(),
            annotation,
            labels,
        }))
    }
}

/// 首次见到设备时按事件映射；否则按状态机转移（质量过滤已保证合法）。
fn resolve_status(current: Option<&DeviceState>, event_type: VehicleEventType) -> VehicleStatus {
    current
        .and_then(|state| state.vehicle_status)
        .and_then(|status| next_state(status, event_type))
        .unwrap_or_else(|| status_for(event_type))
}

#[async_trait]
impl Transform for VehicleEventTransform {
    async fn transform(
        &self,
        message: &StreamMessage,
    ) -> Result<Vec<StreamMessage>, TransformError> {
        let event: VehicleEvent =
            serde_json::from_slice(&message.payload).map_err(ProcessorError::from)?;
        let Some(annotated) = self.process(event).await? else {
            return Ok(Vec::new());
        };
        let key = domain::device_key(&annotated.event.provider_id, &annotated.event.device_id);
        let payload = serde_json::to_vec(&annotated).map_err(ProcessorError::from)?;
        Ok(vec![StreamMessage::with_key(key, payload)])
    }
}
