//! 流处理进程：装配存储、地理标注与三个处理器，提供健康检查与指标快照。

mod http;
mod processors;
mod stores;

use mds_config::AppConfig;
use mds_geo::GeoAnnotator;
use mds_processors::ProcessorContext;
use mds_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 缓存 / 历史表 / 设备参考数据（未配置时回退到内存实现）
    let stores = stores::connect(&config).await?;

    // 地理集合在进程生命周期内固定
    let annotator = match config.geographies_path.as_deref() {
        Some(path) => GeoAnnotator::load(config.annotation_version, path)?,
        None => {
            warn!(target: "mds.app", "geographies_not_configured");
            GeoAnnotator::empty(config.annotation_version)
        }
    };
    let context = ProcessorContext::new(
        stores.cache,
        stores.history,
        stores.registry,
        Arc::new(annotator),
        config.quality_recent_limit,
    );

    let running = processors::build(&config, context);
    for (index, processor) in running.iter().enumerate() {
        if let Err(err) = processor.start().await {
            for started in running[..index].iter().rev() {
                started.stop().await;
            }
            return Err(err.into());
        }
    }

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "mds.app", addr = %config.http_addr, "http_listening");
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, http::router()).await {
            warn!(target: "mds.app", error = %err, "http_server_failed");
        }
    });
    let reporter = tokio::spawn(report_metrics(Duration::from_secs(
        config.metrics_log_interval_seconds.max(1),
    )));

    tokio::signal::ctrl_c().await?;
    info!(target: "mds.app", "shutdown_requested");
    for processor in running.iter().rev() {
        processor.stop().await;
    }
    reporter.abort();
    server.abort();
    info!(target: "mds.app", snapshot = ?metrics().snapshot(), "shutdown_complete");
    Ok(())
}

/// 周期性输出进程指标快照。
async fn report_metrics(every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match serde_json::to_string(&metrics().snapshot()) {
            Ok(snapshot) => info!(target: "mds.metrics", snapshot = %snapshot, "metrics_snapshot"),
            Err(err) => warn!(target: "mds.metrics", error = %err, "metrics_encode_failed"),
        }
    }
}
