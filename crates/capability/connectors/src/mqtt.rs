//! MQTT 主题连接器（rumqttc）。
//!
//! Source 开启手动 ack：消息在处理回调完成后才确认，回调未完成前
//! 不会读取下一条，由此形成背压。死信全部失败时不确认并停止拉取。

use crate::task::TaskSlot;
use async_trait::async_trait;
use mds_stream::{MessageHandler, Sink, Source, StreamError, StreamMessage};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

/// MQTT 连接参数。
#[derive(Debug, Clone)]
pub struct MqttConnection {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
    pub client_prefix: String,
}

impl MqttConnection {
    fn qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    fn connect(&self, role: &str, manual_acks: bool) -> (AsyncClient, EventLoop) {
        let client_id = format!("{}-{}-{}", self.client_prefix, role, uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_manual_acks(manual_acks);
        if let (Some(username), Some(password)) = (self.username.as_ref(), self.password.as_ref()) {
            options.set_credentials(username, password);
        }
        AsyncClient::new(options, 64)
    }
}

/// 订阅单个主题的 Source。
pub struct MqttSource {
    connection: MqttConnection,
    topic: String,
    task: TaskSlot,
}

impl MqttSource {
    pub fn new(connection: MqttConnection, topic: impl Into<String>) -> Self {
        Self {
            connection,
            topic: topic.into(),
            task: TaskSlot::new(),
        }
    }
}

#[async_trait]
impl Source for MqttSource {
    async fn initialize(&self, handler: Arc<dyn MessageHandler>) -> Result<(), StreamError> {
        let (client, eventloop) = self.connection.connect("source", true);
        let topic = self.topic.clone();
        let qos = self.connection.qos();
        self.task
            .start(move |stop| consume(client, eventloop, topic, qos, handler, stop))
            .await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        self.task.stop().await;
        Ok(())
    }
}

async fn consume(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topic: String,
    qos: QoS,
    handler: Arc<dyn MessageHandler>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let polled = tokio::select! {
            _ = stop.changed() => break,
            polled = eventloop.poll() => polled,
        };
        match polled {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // 每次（重）连接后重新订阅
                if let Err(err) = client.subscribe(topic.clone(), qos).await {
                    warn!(target: "mds.connectors", topic = %topic, error = %err, "mqtt_subscribe_failed");
                } else {
                    info!(target: "mds.connectors", topic = %topic, "mqtt_subscribed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = StreamMessage {
                    key: Some(publish.topic.clone()),
                    payload: publish.payload.to_vec(),
                };
                match handler.handle(message).await {
                    Ok(()) => {}
                    Err(StreamError::SinkUnavailable) => {
                        error!(target: "mds.connectors", topic = %topic, "mqtt_source_halted");
                        break;
                    }
                    Err(err) => {
                        warn!(target: "mds.connectors", topic = %topic, error = %err, "mqtt_handler_failed");
                    }
                }
                if let Err(err) = client.ack(&publish).await {
                    warn!(target: "mds.connectors", topic = %topic, error = %err, "mqtt_ack_failed");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "mds.connectors", topic = %topic, error = %err, "mqtt_connection_error");
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }
    let _ = client.disconnect().await;
}

/// 向单个主题发布的 Sink。
pub struct MqttSink {
    connection: MqttConnection,
    topic: String,
    client: Mutex<Option<AsyncClient>>,
    task: TaskSlot,
}

impl MqttSink {
    pub fn new(connection: MqttConnection, topic: impl Into<String>) -> Self {
        Self {
            connection,
            topic: topic.into(),
            client: Mutex::new(None),
            task: TaskSlot::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl Sink for MqttSink {
    async fn initialize(&self) -> Result<(), StreamError> {
        let mut client = self.client.lock().await;
        if client.is_some() {
            return Ok(());
        }
        let (connected, mut eventloop) = self.connection.connect("sink", false);
        let topic = self.topic.clone();
        self.task
            .start(move |mut stop| async move {
                loop {
                    let polled = tokio::select! {
                        _ = stop.changed() => break,
                        polled = eventloop.poll() => polled,
                    };
                    if let Err(err) = polled {
                        warn!(target: "mds.connectors", topic = %topic, error = %err, "mqtt_connection_error");
                        tokio::select! {
                            _ = stop.changed() => break,
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        }
                    }
                }
            })
            .await;
        *client = Some(connected);
        Ok(())
    }

    async fn write(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| StreamError::Sink(format!("mqtt sink {} not initialized", self.topic)))?;
        let qos = self.connection.qos();
        for message in messages {
            client
                .publish(self.topic.clone(), qos, false, message.payload.clone())
                .await
                .map_err(|err| StreamError::Sink(format!("{}: {}", self.topic, err)))?;
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), StreamError> {
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }
        self.task.stop().await;
        Ok(())
    }
}
