//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 可启用的处理器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Events,
    Telemetry,
    Metrics,
}

impl ProcessorKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "events" | "event" => Some(ProcessorKind::Events),
            "telemetry" => Some(ProcessorKind::Telemetry),
            "metrics" => Some(ProcessorKind::Metrics),
            _ => None,
        }
    }
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_qos: u8,
    pub event_topic: String,
    pub telemetry_topic: String,
    pub annotated_event_topic: String,
    pub annotated_telemetry_topic: String,
    pub metrics_topic: String,
    pub dead_letter_topics: Vec<String>,
    pub dead_letter_file: Option<String>,
    pub geographies_path: Option<String>,
    pub annotation_version: u32,
    pub telemetry_grace_ms: u64,
    pub quality_recent_limit: usize,
    pub metrics_log_interval_seconds: u64,
    pub processors: Vec<ProcessorKind>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("MDS_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("MDS_DATABASE_URL");
        let redis_url = read_optional("MDS_REDIS_URL");
        let mqtt_host = env::var("MDS_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("MDS_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("MDS_MQTT_USERNAME");
        let mqtt_password = read_optional("MDS_MQTT_PASSWORD");
        let mqtt_qos = read_u8_with_default("MDS_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "MDS_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let topic_prefix = env::var("MDS_TOPIC_PREFIX").unwrap_or_else(|_| "mds".to_string());
        let topic_prefix = topic_prefix.trim_end_matches('/').to_string();
        let event_topic = read_topic("MDS_EVENT_TOPIC", &topic_prefix, "device-events");
        let telemetry_topic = read_topic("MDS_TELEMETRY_TOPIC", &topic_prefix, "telemetry");
        let annotated_event_topic =
            read_topic("MDS_ANNOTATED_EVENT_TOPIC", &topic_prefix, "annotated/device-events");
        let annotated_telemetry_topic =
            read_topic("MDS_ANNOTATED_TELEMETRY_TOPIC", &topic_prefix, "annotated/telemetry");
        let metrics_topic = read_topic("MDS_METRICS_TOPIC", &topic_prefix, "metrics");
        let dead_letter_topics = match read_optional("MDS_DEAD_LETTER_TOPICS") {
            Some(value) => read_list(&value),
            None => vec![format!("{}/dead-letter", topic_prefix)],
        };
        let dead_letter_file = read_optional("MDS_DEAD_LETTER_FILE");
        let geographies_path = read_optional("MDS_GEOGRAPHIES_PATH");
        let annotation_version = read_u32_with_default("MDS_ANNOTATION_VERSION", 1)?;
        let telemetry_grace_ms = read_u64_with_default("MDS_TELEMETRY_GRACE_MS", 3000)?;
        let quality_recent_limit = read_u64_with_default("MDS_QUALITY_RECENT_LIMIT", 25)? as usize;
        let metrics_log_interval_seconds =
            read_u64_with_default("MDS_METRICS_LOG_INTERVAL_SECONDS", 60)?;
        let processors = match read_optional("MDS_PROCESSORS") {
            Some(value) => read_processors(&value)?,
            None => vec![
                ProcessorKind::Events,
                ProcessorKind::Telemetry,
                ProcessorKind::Metrics,
            ],
        };

        Ok(Self {
            http_addr,
            database_url,
            redis_url,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_qos,
            event_topic,
            telemetry_topic,
            annotated_event_topic,
            annotated_telemetry_topic,
            metrics_topic,
            dead_letter_topics,
            dead_letter_file,
            geographies_path,
            annotation_version,
            telemetry_grace_ms,
            quality_recent_limit,
            metrics_log_interval_seconds,
            processors,
        })
    }

    pub fn processor_enabled(&self, kind: ProcessorKind) -> bool {
        self.processors.contains(&kind)
    }
}

fn read_topic(key: &str, prefix: &str, suffix: &str) -> String {
    read_optional(key).unwrap_or_else(|| format!("{}/{}", prefix, suffix))
}

fn read_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_processors(value: &str) -> Result<Vec<ProcessorKind>, ConfigError> {
    let mut kinds = Vec::new();
    for item in read_list(value) {
        let kind = ProcessorKind::parse(&item)
            .ok_or_else(|| ConfigError::Invalid("MDS_PROCESSORS".to_string(), item.clone()))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
