use crate::{
    FatalHandler, MessageHandler, ProcessExit, Sink, Source, StreamError, StreamMessage, Transform,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span, warn};

/// 处理器生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Stopped,
    Initializing,
    Running,
    Stopping,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessorState::Stopped => "stopped",
            ProcessorState::Initializing => "initializing",
            ProcessorState::Running => "running",
            ProcessorState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// 逐条消息调度：转换、扇出、死信。
struct Dispatcher {
    name: String,
    transform: Arc<dyn Transform>,
    sinks: Vec<Arc<dyn Sink>>,
    dead_letter_sinks: Vec<Arc<dyn Sink>>,
    fatal: Arc<dyn FatalHandler>,
    gate: Mutex<()>,
}

impl Dispatcher {
    async fn dispatch(&self, message: StreamMessage) -> Result<(), StreamError> {
        let _serial = self.gate.lock().await;
        mds_telemetry::record_message_received();

        let outputs = match self.transform.transform(&message).await {
            Ok(outputs) => outputs,
            Err(err) => {
                mds_telemetry::record_transform_failure();
                warn!(
                    target: "mds.stream",
                    processor = %self.name,
                    error = %err,
                    "transform_failed"
                );
                return self.dead_letter(&message, &StreamError::Transform(err)).await;
            }
        };
        if outputs.is_empty() {
            return Ok(());
        }
        match self.write_primary(&outputs).await {
            Ok(()) => {
                mds_telemetry::record_messages_emitted(outputs.len() as u64);
                Ok(())
            }
            Err(err) => self.dead_letter(&message, &err).await,
        }
    }

    async fn write_primary(&self, outputs: &[StreamMessage]) -> Result<(), StreamError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.write(outputs).await {
                mds_telemetry::record_sink_write_failure();
                warn!(
                    target: "mds.stream",
                    processor = %self.name,
                    error = %err,
                    "sink_write_failed"
                );
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 原始消息写入全部死信 Sink；至少一个成功即视为已处理。
    async fn dead_letter(
        &self,
        message: &StreamMessage,
        cause: &StreamError,
    ) -> Result<(), StreamError> {
        let mut delivered = 0usize;
        for sink in &self.dead_letter_sinks {
            match sink.write(std::slice::from_ref(message)).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    mds_telemetry::record_dead_letter_failure();
                    warn!(
                        target: "mds.stream",
                        processor = %self.name,
                        error = %err,
                        "dead_letter_write_failed"
                    );
                }
            }
        }
        if delivered > 0 {
            mds_telemetry::record_dead_lettered();
            info!(
                target: "mds.stream",
                processor = %self.name,
                cause = %cause,
                delivered,
                "dead_letter_written"
            );
            return Ok(());
        }

        let err = StreamError::SinkUnavailable;
        error!(
            target: "mds.stream",
            processor = %self.name,
            cause = %cause,
            payload = %message.payload_text(),
            "dead_letter_unavailable"
        );
        self.fatal.on_fatal(&self.name, &err);
        Err(err)
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: StreamMessage) -> Result<(), StreamError> {
        // 每条消息一个追踪 span，便于串联转换、死信日志
        let span = info_span!(
            "message",
            processor = %self.name,
            trace_id = %mds_telemetry::new_trace_id()
        );
        self.dispatch(message).instrument(span).await
    }
}

/// 处理器构造器。
pub struct StreamProcessorBuilder {
    name: String,
    source: Arc<dyn Source>,
    transform: Arc<dyn Transform>,
    sinks: Vec<Arc<dyn Sink>>,
    dead_letter_sinks: Vec<Arc<dyn Sink>>,
    fatal: Arc<dyn FatalHandler>,
}

impl StreamProcessorBuilder {
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn dead_letter_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.dead_letter_sinks.push(sink);
        self
    }

    pub fn fatal_handler(mut self, fatal: Arc<dyn FatalHandler>) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn build(self) -> StreamProcessor {
        StreamProcessor {
            source: self.source,
            dispatcher: Arc::new(Dispatcher {
                name: self.name,
                transform: self.transform,
                sinks: self.sinks,
                dead_letter_sinks: self.dead_letter_sinks,
                fatal: self.fatal,
                gate: Mutex::new(()),
            }),
            state: Mutex::new(ProcessorState::Stopped),
        }
    }
}

/// 流处理器：组合一个 Source、一个 Transform、若干主 Sink 与死信 Sink。
pub struct StreamProcessor {
    source: Arc<dyn Source>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ProcessorState>,
}

impl StreamProcessor {
    pub fn builder(
        name: impl Into<String>,
        source: Arc<dyn Source>,
        transform: Arc<dyn Transform>,
    ) -> StreamProcessorBuilder {
        StreamProcessorBuilder {
            name: name.into(),
            source,
            transform,
            sinks: Vec::new(),
            dead_letter_sinks: Vec::new(),
            fatal: Arc::new(ProcessExit),
        }
    }

    pub fn name(&self) -> &str {
        &self.dispatcher.name
    }

    pub async fn state(&self) -> ProcessorState {
        *self.state.lock().await
    }

    /// 依次初始化主 Sink、死信 Sink、Transform、Source。任一失败时回滚已初始化部分。
    pub async fn start(&self) -> Result<(), StreamError> {
        {
            let mut state = self.state.lock().await;
            if *state != ProcessorState::Stopped {
                return Err(StreamError::InvalidState(format!(
                    "cannot start {} while {}",
                    self.dispatcher.name, *state
                )));
            }
            *state = ProcessorState::Initializing;
        }

        if let Err(err) = self.initialize_all().await {
            error!(
                target: "mds.stream",
                processor = %self.dispatcher.name,
                error = %err,
                "processor_start_failed"
            );
            self.shutdown_all().await;
            *self.state.lock().await = ProcessorState::Stopped;
            return Err(err);
        }

        *self.state.lock().await = ProcessorState::Running;
        info!(
            target: "mds.stream",
            processor = %self.dispatcher.name,
            sinks = self.dispatcher.sinks.len(),
            dead_letter_sinks = self.dispatcher.dead_letter_sinks.len(),
            "processor_started"
        );
        Ok(())
    }

    async fn initialize_all(&self) -> Result<(), StreamError> {
        for sink in &self.dispatcher.sinks {
            sink.initialize().await?;
        }
        for sink in &self.dispatcher.dead_letter_sinks {
            sink.initialize().await?;
        }
        self.dispatcher.transform.initialize().await?;
        let handler: Arc<dyn MessageHandler> = self.dispatcher.clone();
        self.source.initialize(handler).await
    }

    /// 依次停止 Source、Transform 延迟任务、死信 Sink、主 Sink。
    /// 单个组件停止失败只记录日志。已停止时直接返回。
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().await;
            if *state != ProcessorState::Running {
                return;
            }
            *state = ProcessorState::Stopping;
        }
        self.shutdown_all().await;
        *self.state.lock().await = ProcessorState::Stopped;
        info!(target: "mds.stream", processor = %self.dispatcher.name, "processor_stopped");
    }

    async fn shutdown_all(&self) {
        let name = &self.dispatcher.name;
        if let Err(err) = self.source.shutdown().await {
            warn!(target: "mds.stream", processor = %name, error = %err, "source_shutdown_failed");
        }
        self.dispatcher.transform.shutdown().await;
        for sink in &self.dispatcher.dead_letter_sinks {
            if let Err(err) = sink.shutdown().await {
                warn!(
                    target: "mds.stream",
                    processor = %name,
                    error = %err,
                    "dead_letter_sink_shutdown_failed"
                );
            }
        }
        for sink in &self.dispatcher.sinks {
            if let Err(err) = sink.shutdown().await {
                warn!(target: "mds.stream", processor = %name, error = %err, "sink_shutdown_failed");
            }
        }
    }
}
