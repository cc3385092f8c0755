use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

use super::serve::ServeContext;

const STORE_PING_TIMEOUT: Duration = Duration::from_secs(5);

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

impl AppStartTime {
    pub fn now() -> Self {
        Self {
            start_datetime: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthFeatures {
    pub vast: bool,
    pub rtb: bool,
    pub ssp: bool,
    pub caching: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub uptime: u64,
    pub features: HealthFeatures,
}

#[derive(Debug, Serialize)]
pub struct UnhealthyReport {
    pub status: &'static str,
    pub error: String,
}

/// Health Service
///
/// 只检查存储是否可达，不走投放逻辑。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(ctx: &ServeContext) -> HttpResponse {
        let start_time = Instant::now();
        trace!("Received health check request");

        let failure = match tokio::time::timeout(STORE_PING_TIMEOUT, ctx.store.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                Some("Database connection failed".to_string())
            }
            Err(_) => {
                error!("Storage health check timeout");
                Some("Database health check timed out".to_string())
            }
        };

        let response = match failure {
            None => {
                let now = chrono::Utc::now();
                let uptime = (now - ctx.start_time.start_datetime).num_seconds().max(0) as u64;
                HttpResponse::build(StatusCode::OK).json(HealthReport {
                    status: "healthy",
                    timestamp: now.to_rfc3339(),
                    version: env!("CARGO_PKG_VERSION"),
                    uptime,
                    features: HealthFeatures {
                        vast: ctx.features.vast,
                        rtb: ctx.features.rtb_enabled(),
                        ssp: ctx.features.ssp,
                        caching: ctx.caching,
                    },
                })
            }
            Some(error) => HttpResponse::build(StatusCode::SERVICE_UNAVAILABLE).json(UnhealthyReport {
                status: "unhealthy",
                error,
            }),
        };

        info!(
            "Health check completed in {:?}, status: {}",
            start_time.elapsed(),
            response.status()
        );
        response
    }
}
