//! HTTP timing middleware
//!
//! Logs every request at `debug` and requests slower than the configured
//! threshold at `warn`. Never touches the response.

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// HTTP timing middleware factory
#[derive(Clone)]
pub struct TimingMiddleware {
    slow_threshold: Duration,
}

impl TimingMiddleware {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl<S, B> Transform<S, ServiceRequest> for TimingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingService {
            service: Rc::new(service),
            slow_threshold: self.slow_threshold,
        }))
    }
}

pub struct TimingService<S> {
    service: Rc<S>,
    slow_threshold: Duration,
}

impl<S, B> Service<ServiceRequest> for TimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let slow_threshold = self.slow_threshold;
        let start = Instant::now();

        let method = req.method().to_string();
        let target = match req.query_string() {
            "" => req.path().to_string(),
            query => format!("{}?{}", req.path(), query),
        };

        Box::pin(async move {
            let result = srv.call(req).await;

            let elapsed = start.elapsed();
            let status = match &result {
                Ok(response) => response.status().as_u16(),
                Err(_) => 500,
            };

            if elapsed >= slow_threshold {
                warn!(
                    "Slow request: {} {} -> {} in {}ms",
                    method,
                    target,
                    status,
                    elapsed.as_millis()
                );
            } else {
                debug!(
                    "{} {} -> {} in {}ms",
                    method,
                    target,
                    status,
                    elapsed.as_millis()
                );
            }

            result
        })
    }
}
