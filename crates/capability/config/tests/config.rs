use mds_config::{AppConfig, ProcessorKind};

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("MDS_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("MDS_TOPIC_PREFIX", "city/");
        std::env::set_var("MDS_DEAD_LETTER_TOPICS", "city/dlq-a, city/dlq-b,");
        std::env::set_var("MDS_TELEMETRY_GRACE_MS", "1500");
        std::env::set_var("MDS_PROCESSORS", "events,metrics,events");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.event_topic, "city/device-events");
    assert_eq!(config.annotated_telemetry_topic, "city/annotated/telemetry");
    assert_eq!(config.dead_letter_topics, vec!["city/dlq-a", "city/dlq-b"]);
    assert_eq!(config.telemetry_grace_ms, 1500);
    assert_eq!(config.annotation_version, 1);
    assert_eq!(
        config.processors,
        vec![ProcessorKind::Events, ProcessorKind::Metrics]
    );
    assert!(!config.processor_enabled(ProcessorKind::Telemetry));
}
