//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It wires the services prepared at startup into a single `/serve` route.

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::api::middleware::TimingMiddleware;
use crate::api::services::{AppStartTime, serve_routes};
use crate::config::StaticConfig;
use crate::runtime::lifetime;

/// 最大 worker 数
const MAX_WORKERS: usize = 32;

/// 播放器可能嵌在任意页面里，CORS 完全放开
pub fn build_cors_middleware() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

/// 不带 Origin 的请求 Cors 中间件不做处理，这里补上 `*`
pub fn build_default_headers() -> DefaultHeaders {
    DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*"))
}

/// Run the HTTP server
///
/// This function:
/// 1. Records startup time
/// 2. Prepares server components (storage, caches, event worker, services)
/// 3. Configures and starts the HTTP server
/// 4. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: &StaticConfig) -> Result<()> {
    let app_start_time = AppStartTime::now();

    let startup = lifetime::startup::prepare_server_startup(config, app_start_time)
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let lifetime::startup::StartupContext {
        storage,
        events,
        event_worker,
        serve,
    } = startup;
    let app_serve = serve.clone();
    let slow_threshold = Duration::from_millis(config.serving.slow_request_ms);

    let cpu_count = config.server.cpu_count.clamp(1, MAX_WORKERS);
    warn!("Using {} CPU cores for the server", cpu_count);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TimingMiddleware::new(slow_threshold)) // 最外层，记录请求延迟
            .wrap(build_cors_middleware())
            .wrap(Compress::default())
            .wrap(build_default_headers())
            .app_data(app_serve.clone())
            .app_data(web::PayloadConfig::new(1024 * 1024))
            .service(serve_routes())
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .workers(cpu_count)
    .disable_signals();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    let handle = server.handle();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
            lifetime::shutdown::perform_shutdown_tasks(&events).await;
        }
        _ = lifetime::shutdown::listen_for_shutdown(&events) => {
            handle.stop(true).await;
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    // 所有句柄释放后 worker 做最后一次刷盘并退出
    drop(events);
    drop(serve);
    match tokio::time::timeout(Duration::from_secs(5), event_worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Event worker ended abnormally: {}", e),
        Err(_) => warn!("Event worker still running after shutdown flush"),
    }
    info!("Server stopped ({} backend)", storage.backend_name());

    Ok(())
}
