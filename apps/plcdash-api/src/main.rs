//! PLC 监控后台：配置 CRUD API、扫描流水线装配与状态推送。

mod handlers;
mod routes;
mod utils;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use plcdash_broadcast::{BroadcastConfig, StatusBroadcaster, StatusHub};
use plcdash_config::AppConfig;
use plcdash_registry::Registry;
use plcdash_resolver::{SharedRouting, compile};
use plcdash_router::{
    InMemoryPermanentStore, InMemoryTimeseriesStore, PermanentStore, RouterConfig, StorageRouter,
    TimeseriesStore, spawn_retention_sweep,
};
use plcdash_scheduler::{NoopReader, PlcReader, ScanScheduler, SchedulerConfig};
use plcdash_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, warn};

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    routing: SharedRouting,
    permanent: Arc<dyn PermanentStore>,
    timeseries: Arc<dyn TimeseriesStore>,
    hub: StatusHub,
    reader: Arc<dyn PlcReader>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let registry = Arc::new(Registry::new());

    // 首个快照取不到属于致命错误，直接中止启动
    let snapshot = registry.snapshot()?;
    let routing = SharedRouting::new(compile(&snapshot)?);
    spawn_routing_refresh(Arc::clone(&registry), routing.clone());

    // 扫描 → 路由的值流水线与健康信号流
    let (values_tx, values_rx) = mpsc::channel(config.value_channel_capacity);
    let (health_tx, health_rx) = mpsc::channel(config.health_channel_capacity);

    let (hub, _broadcast_handle) = StatusBroadcaster::spawn(
        Arc::clone(&registry),
        health_rx,
        BroadcastConfig {
            failure_threshold: config.failure_threshold,
            subscriber_buffer: config.subscriber_buffer,
        },
    )?;

    // 协议驱动尚未接入：占位驱动让全部 PLC 走 Error 状态路径
    let reader: Arc<dyn PlcReader> = Arc::new(NoopReader);
    let _scheduler_handle = ScanScheduler::spawn(
        Arc::clone(&registry),
        Arc::clone(&reader),
        values_tx,
        health_tx,
        SchedulerConfig {
            read_timeout_ms: config.read_timeout_ms,
        },
    )?;

    let permanent: Arc<dyn PermanentStore> = Arc::new(InMemoryPermanentStore::new());
    let timeseries: Arc<dyn TimeseriesStore> = Arc::new(InMemoryTimeseriesStore::new());
    let _router_handle = StorageRouter::spawn(
        routing.clone(),
        Arc::clone(&permanent),
        Arc::clone(&timeseries),
        values_rx,
        RouterConfig {
            write_max_retries: config.write_max_retries,
            write_backoff_ms: config.write_backoff_ms,
        },
    );
    let _sweep_handle = spawn_retention_sweep(
        routing.clone(),
        Arc::clone(&timeseries),
        Duration::from_secs(config.retention_sweep_interval_s),
    );

    let state = AppState {
        registry,
        routing,
        permanent,
        timeseries,
        hub,
        reader,
    };

    // 同一套路由同时挂在 / 和 /api 前缀下
    let api = routes::create_api_router();
    let app = axum::Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "plcdash-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// 配置代次变化后重编译路由表；编译失败时旧表继续生效。
fn spawn_routing_refresh(registry: Arc<Registry>, routing: SharedRouting) {
    let mut generation_rx = registry.subscribe_generation();
    tokio::spawn(async move {
        while generation_rx.changed().await.is_ok() {
            match registry.snapshot() {
                Ok(snapshot) => {
                    let _ = routing.recompile_from(&snapshot);
                }
                Err(err) => warn!(error = %err, "snapshot refresh failed"),
            }
        }
    });
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
