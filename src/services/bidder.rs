//! 合作方竞价请求
//!
//! 外部合作方与 SSP 使用同一种请求格式：
//! POST `{zone_id, bid_request_id, timestamp}`，Bearer 鉴权，
//! 回包至少包含一个 VAST 地址。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};
use ureq::Agent;

use super::fetcher::validate_url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BidError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("response has no VAST url")]
    MissingVastUrl,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerBidRequest {
    pub zone_id: i64,
    pub bid_request_id: String,
    pub timestamp: i64,
}

impl PartnerBidRequest {
    pub fn new(zone_id: i64) -> Self {
        Self {
            zone_id,
            bid_request_id: format!("breq_{}", uuid::Uuid::new_v4().simple()),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// 合作方回包：`vast_url` 优先于 `adm`，`bid_price` 优先于 `price`，
/// 价格可以是数字也可以是数字字符串
#[derive(Debug, Deserialize)]
struct PartnerBidReply {
    #[serde(default)]
    vast_url: Option<String>,
    #[serde(default)]
    adm: Option<String>,
    #[serde(default)]
    bid_price: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    currency: Option<String>,
}

fn price_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 合作方给出的出价
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerBid {
    pub vast_url: String,
    pub bid_price: f64,
    pub currency: String,
    pub response_time_ms: u64,
}

impl PartnerBidReply {
    fn into_bid(self, response_time_ms: u64) -> Result<PartnerBid, BidError> {
        let vast_url = self
            .vast_url
            .filter(|u| !u.trim().is_empty())
            .or(self.adm.filter(|u| !u.trim().is_empty()))
            .ok_or(BidError::MissingVastUrl)?;
        let bid_price = price_value(self.bid_price.as_ref())
            .or_else(|| price_value(self.price.as_ref()))
            .filter(|p| p.is_finite())
            .unwrap_or(0.0);
        Ok(PartnerBid {
            vast_url,
            bid_price,
            currency: self
                .currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "USD".to_string()),
            response_time_ms,
        })
    }
}

#[async_trait]
pub trait BidClient: Send + Sync {
    async fn request_bid(
        &self,
        endpoint: &str,
        api_key: &str,
        zone_id: i64,
        timeout: Duration,
    ) -> Result<PartnerBid, BidError>;
}

pub struct HttpBidClient {
    agent: Agent,
    user_agent: String,
}

impl HttpBidClient {
    pub fn new(user_agent: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .max_redirects(3)
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }

    fn request_sync(
        agent: Agent,
        user_agent: String,
        endpoint: String,
        api_key: String,
        request: PartnerBidRequest,
        timeout: Duration,
    ) -> Result<PartnerBid, BidError> {
        let started = Instant::now();
        let mut resp = agent
            .post(&endpoint)
            .header("User-Agent", &user_agent)
            .header("Authorization", &format!("Bearer {}", api_key))
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send_json(&request)
            .map_err(|e| BidError::Transport(e.to_string()))?;
        let elapsed = started.elapsed().as_millis() as u64;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(BidError::Status(status));
        }

        let reply: PartnerBidReply = resp
            .body_mut()
            .read_json()
            .map_err(|e| BidError::InvalidResponse(e.to_string()))?;
        reply.into_bid(elapsed)
    }
}

#[async_trait]
impl BidClient for HttpBidClient {
    async fn request_bid(
        &self,
        endpoint: &str,
        api_key: &str,
        zone_id: i64,
        timeout: Duration,
    ) -> Result<PartnerBid, BidError> {
        validate_url(endpoint).map_err(|e| BidError::InvalidEndpoint(e.to_string()))?;

        let request = PartnerBidRequest::new(zone_id);
        trace!(
            "Sending bid request {} for zone {} to {}",
            request.bid_request_id, zone_id, endpoint
        );

        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let endpoint_owned = endpoint.to_string();
        let api_key = api_key.to_string();
        let bid = tokio::task::spawn_blocking(move || {
            Self::request_sync(agent, user_agent, endpoint_owned, api_key, request, timeout)
        })
        .await
        .map_err(|e| BidError::Transport(format!("bid task failed: {}", e)))??;

        debug!(
            "Partner {} bid {} {} in {}ms",
            endpoint, bid.bid_price, bid.currency, bid.response_time_ms
        );
        Ok(bid)
    }
}
