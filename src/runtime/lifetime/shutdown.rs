use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::events::EventManager;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

pub async fn listen_for_shutdown(events: &EventManager) {
    // 等待 Ctrl+C 信号
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, flushing data...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(events),
    )
    .await;

    match shutdown_result {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }
}

/// 执行所有关闭任务（在超时内调用）
pub async fn perform_shutdown_tasks(events: &EventManager) {
    // 刷新计数器与排队中的事件
    match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), events.flush()).await {
        Ok(Ok(())) => {
            info!("EventManager flushed successfully");
        }
        Ok(Err(e)) => {
            error!("EventManager flush failed: {}", e);
        }
        Err(_) => {
            error!(
                "EventManager flush timed out after {} seconds",
                TASK_TIMEOUT_SECS
            );
        }
    }
}
