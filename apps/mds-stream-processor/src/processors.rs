//! 处理器装配
//!
//! 每个启用的处理器都是一个 `StreamProcessor`：MQTT 主题 Source →
//! 对应的 Transform → 输出主题 Sink。所有处理器共享同一组死信 Sink
//! 配置（每个处理器持有独立连接）。

use mds_config::{AppConfig, ProcessorKind};
use mds_connectors::{FileSink, MqttConnection, MqttSink, MqttSource};
use mds_processors::{MetricsTransform, ProcessorContext, TelemetryTransform, VehicleEventTransform};
use mds_stream::{Sink, StreamProcessor, StreamProcessorBuilder, Transform};
use std::sync::Arc;
use std::time::Duration;

fn connection(config: &AppConfig) -> MqttConnection {
    MqttConnection {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        qos: config.mqtt_qos,
        client_prefix: "mds".to_string(),
    }
}

/// 按配置构建启用的处理器（按启动顺序返回）。
pub fn build(config: &AppConfig, context: ProcessorContext) -> Vec<StreamProcessor> {
    let mut processors = Vec::new();
    if config.processor_enabled(ProcessorKind::Events) {
        processors.push(assemble(
            config,
            "vehicle-events",
            &config.event_topic,
            Arc::new(VehicleEventTransform::new(context.clone())),
            &config.annotated_event_topic,
        ));
    }
    if config.processor_enabled(ProcessorKind::Telemetry) {
        processors.push(assemble(
            config,
            "telemetry",
            &config.telemetry_topic,
            Arc::new(TelemetryTransform::new(
                context.clone(),
                Duration::from_millis(config.telemetry_grace_ms),
            )),
            &config.annotated_telemetry_topic,
        ));
    }
    if config.processor_enabled(ProcessorKind::Metrics) {
        // 指标处理器消费两个标注输出主题
        for (name, topic) in [
            ("metrics-events", &config.annotated_event_topic),
            ("metrics-telemetry", &config.annotated_telemetry_topic),
        ] {
            processors.push(assemble(
                config,
                name,
                topic,
                Arc::new(MetricsTransform::new()),
                &config.metrics_topic,
            ));
        }
    }
    processors
}

fn assemble(
    config: &AppConfig,
    name: &str,
    input: &str,
    transform: Arc<dyn Transform>,
    output: &str,
) -> StreamProcessor {
    let connection = connection(config);
    let source = Arc::new(MqttSource::new(connection.clone(), input));
    let builder = StreamProcessor::builder(name, source, transform)
        .sink(Arc::new(MqttSink::new(connection.clone(), output)));
    with_dead_letters(builder, config, &connection).build()
}

fn with_dead_letters(
    mut builder: StreamProcessorBuilder,
    config: &AppConfig,
    connection: &MqttConnection,
) -> StreamProcessorBuilder {
    for topic in &config.dead_letter_topics {
        let sink: Arc<dyn Sink> = Arc::new(MqttSink::new(connection.clone(), topic.clone()));
        builder = builder.dead_letter_sink(sink);
    }
    if let Some(path) = config.dead_letter_file.as_deref() {
        builder = builder.dead_letter_sink(Arc::new(FileSink::new(path)));
    }
    builder
}
