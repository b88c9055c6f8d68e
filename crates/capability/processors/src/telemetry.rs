use crate::ProcessorError;
use crate::context::ProcessorContext;
use crate::output::AnnotatedTelemetry;
use async_trait::async_trait;
use domain::{DeviceState, Record, Telemetry};
use mds_stream::{StreamMessage, Transform, TransformError};
use mds_trips::DeferredCorrelator;
use std::time::Duration;

/// 遥测处理器：接受后的遥测在宽限期后关联行程。
pub struct TelemetryTransform {
    context: ProcessorContext,
    deferred: DeferredCorrelator,
}

impl TelemetryTransform {
    pub fn new(context: ProcessorContext, grace: Duration) -> Self {
        let deferred = DeferredCorrelator::new(context.correlator.clone(), grace);
        Self { context, deferred }
    }

    pub fn deferred(&self) -> &DeferredCorrelator {
        &self.deferred
    }

    pub async fn process(
        &self,
        telemetry: Telemetry,
    ) -> Result<Option<AnnotatedTelemetry>, ProcessorError> {
        if telemetry.provider_id.is_empty() {
            return Err(ProcessorError::MissingField("provider_id"));
        }
        if telemetry.device_id.is_empty() {
            return Err(ProcessorError::MissingField("device_id"));
        }
        let ctx = &self.context;
        let current = ctx
            .cache
            .get_device_state(&telemetry.provider_id, &telemetry.device_id)
            .await?;
        let record = Record::Telemetry(telemetry.clone());
        if ctx.quality.check(&record, current.as_ref()).await?.is_err() {
            return Ok(None);
        }

        let annotation = ctx.annotator.annotate(&telemetry.gps);
        let state = DeviceState::from_telemetry(
            &telemetry,
            ctx.annotator.version(),
            Some(annotation.clone()),
            current.as_ref().and_then(|current| current.vehicle_status),
        );
        ctx.apply(&state, current.as_ref()).await?;
        if !self.deferred.schedule(state.clone()).await {
            // 调度器已关闭：立即关联，不等宽限期
            ctx.correlator.correlate_telemetry(&state).await?;
        }
        mds_telemetry::record_accepted_telemetry();

        let labels = ctx
            .labels(
                &telemetry.provider_id,
                &telemetry.device_id,
                Some(&annotation),
                telemetry.recorded.saturating_sub(telemetry.timestamp),
            )
            .await;
        Ok(Some(AnnotatedTelemetry {
            telemetry,
            annotation_version: ctx.annotator.version(),
            annotation: Some(annotation),
            labels,
        }))
    }
}

#[async_trait]
impl Transform for TelemetryTransform {
    async fn transform(
        &self,
        message: &StreamMessage,
    ) -> Result<Vec<StreamMessage>, TransformError> {
        let telemetry: Telemetry =
            serde_json::from_slice(&message.payload).map_err(ProcessorError::from)?;
        let Some(annotated) = self.process(telemetry).await? else {
            return Ok(Vec::new());
        };
        let key = domain::device_key(
            &annotated.telemetry.provider_id,
            &annotated.telemetry.device_id,
        );
        let payload = serde_json::to_vec(&annotated).map_err(ProcessorError::from)?;
        Ok(vec![StreamMessage::with_key(key, payload)])
    }

    async fn initialize(&self) -> Result<(), TransformError> {
        self.deferred.open().await;
        Ok(())
    }

    async fn shutdown(&self) {
        self.deferred.shutdown().await;
    }
}
