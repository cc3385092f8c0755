//! 最小 OpenRTB 应答
//!
//! 入站请求只看 `id`、`imp[].id` 和 `ext.zone_id`。无论成功与否都返回结构
//! 合法的应答，zone 级别的问题用 `ext.status` 标记。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::bidder::{BidClient, BidError};
use super::campaign_pool::CampaignPool;
use super::zone_store::ZoneStore;
use crate::events::EventManager;
use crate::storage::Zone;
use crate::storage::models::{BidOrigin, BidStatus, RtbBid};
use crate::vast::wrapper_document;

pub const DEFAULT_SEAT: &str = "adserver";
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtbStatus {
    Ok,
    NoZone,
    ZoneInactive,
    InvalidRequest,
}

#[derive(Debug, Deserialize)]
struct InboundImp {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct InboundExt {
    #[serde(default)]
    zone_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InboundRequest {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    imp: Vec<InboundImp>,
    #[serde(default)]
    ext: Option<InboundExt>,
}

/// 数字或字符串形式的 id 统一转成字符串
fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_zone_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    pub adm: String,
    pub nurl: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    pub seat: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseExt {
    pub status: RtbStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    pub seatbid: Vec<SeatBid>,
    pub bidid: String,
    pub cur: String,
    pub ext: ResponseExt,
}

impl BidResponse {
    fn new(request_id: String, bids: Vec<Bid>, status: RtbStatus) -> Self {
        Self {
            id: request_id,
            // 每个 bid 单独一个 seat
            seatbid: bids
                .into_iter()
                .map(|bid| SeatBid {
                    bid: vec![bid],
                    seat: DEFAULT_SEAT.to_string(),
                })
                .collect(),
            bidid: format!("bid_{}", uuid::Uuid::new_v4().simple()),
            cur: DEFAULT_CURRENCY.to_string(),
            ext: ResponseExt { status },
        }
    }
}

/// 一次 RTB 请求的上下文
#[derive(Debug, Clone)]
pub struct BidContext {
    pub request_id: String,
    pub impid: String,
}

/// 出价来源
#[async_trait]
pub trait BidSource: Send + Sync {
    async fn collect(&self, zone: &Zone, context: &BidContext) -> Vec<Bid>;
}

/// 向一个有效的外部合作方询价
pub struct PartnerBidSource {
    campaigns: CampaignPool,
    bidder: Arc<dyn BidClient>,
    events: EventManager,
    bid_timeout: Duration,
}

impl PartnerBidSource {
    pub fn new(
        campaigns: CampaignPool,
        bidder: Arc<dyn BidClient>,
        events: EventManager,
        bid_timeout: Duration,
    ) -> Self {
        Self {
            campaigns,
            bidder,
            events,
            bid_timeout,
        }
    }
}

#[async_trait]
impl BidSource for PartnerBidSource {
    async fn collect(&self, zone: &Zone, context: &BidContext) -> Vec<Bid> {
        let candidate = match self.campaigns.pick_external().await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("RTB: external candidates unavailable: {}", e);
                return Vec::new();
            }
        };
        let source = &candidate.source;

        let started = Instant::now();
        let result = self
            .bidder
            .request_bid(&source.endpoint_url, &source.api_key, zone.id, self.bid_timeout)
            .await;

        match result {
            Ok(bid) => {
                trace!(
                    "RTB: request {} partner {} bid {} {}",
                    context.request_id, source.id, bid.bid_price, bid.currency
                );
                self.events.record_bid(RtbBid {
                    zone_id: zone.id,
                    origin: BidOrigin::External(source.id),
                    bid_price: bid.bid_price,
                    currency: bid.currency.clone(),
                    response_time_ms: bid.response_time_ms,
                    status: BidStatus::Success,
                    vast_url: Some(bid.vast_url.clone()),
                    timestamp: Utc::now(),
                });
                let adm = wrapper_document(&format!("rtb_{}", source.id), &bid.vast_url, None);
                vec![Bid {
                    id: format!("bid_{}", uuid::Uuid::new_v4().simple()),
                    impid: context.impid.clone(),
                    price: bid.bid_price,
                    adm: adm.into_string(),
                    nurl: bid.vast_url,
                }]
            }
            Err(e) => {
                debug!(
                    "RTB: request {} partner {} gave no bid: {}",
                    context.request_id, source.id, e
                );
                let status = match e {
                    BidError::MissingVastUrl => BidStatus::NoBid,
                    _ => BidStatus::Failed,
                };
                self.events.record_bid(RtbBid {
                    zone_id: zone.id,
                    origin: BidOrigin::External(source.id),
                    bid_price: 0.0,
                    currency: DEFAULT_CURRENCY.to_string(),
                    response_time_ms: started.elapsed().as_millis() as u64,
                    status,
                    vast_url: None,
                    timestamp: Utc::now(),
                });
                Vec::new()
            }
        }
    }
}

#[derive(Clone)]
pub struct RtbResponder {
    zones: ZoneStore,
    sources: Vec<Arc<dyn BidSource>>,
}

impl RtbResponder {
    pub fn new(zones: ZoneStore, sources: Vec<Arc<dyn BidSource>>) -> Self {
        Self { zones, sources }
    }

    pub async fn build(&self, body: &[u8]) -> BidResponse {
        let request: InboundRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                warn!("RTB: invalid bid request: {}", e);
                return BidResponse::new(String::new(), Vec::new(), RtbStatus::InvalidRequest);
            }
        };

        let Some(request_id) = request.id.as_ref().and_then(value_to_string) else {
            warn!("RTB: bid request without id");
            return BidResponse::new(String::new(), Vec::new(), RtbStatus::InvalidRequest);
        };

        let Some(zone_id) = request
            .ext
            .as_ref()
            .and_then(|ext| ext.zone_id.as_ref())
            .and_then(value_to_zone_id)
        else {
            debug!("RTB: request {} has no zone", request_id);
            return BidResponse::new(request_id, Vec::new(), RtbStatus::NoZone);
        };

        // 不存在和未激活同样处理
        let zone = match self.zones.resolve(zone_id).await {
            Ok(Some(zone)) if zone.is_active() => zone,
            Ok(_) => {
                debug!("RTB: zone {} missing or inactive", zone_id);
                return BidResponse::new(request_id, Vec::new(), RtbStatus::ZoneInactive);
            }
            Err(e) => {
                warn!("RTB: zone {} lookup failed: {}", zone_id, e);
                return BidResponse::new(request_id, Vec::new(), RtbStatus::ZoneInactive);
            }
        };

        let context = BidContext {
            request_id: request_id.clone(),
            impid: request
                .imp
                .first()
                .and_then(|imp| imp.id.as_ref())
                .and_then(value_to_string)
                .unwrap_or_else(|| "1".to_string()),
        };

        let started = Instant::now();
        let mut bids = Vec::new();
        for source in &self.sources {
            bids.extend(source.collect(&zone, &context).await);
        }

        debug!(
            "RTB response for {}: {} bid(s) in {}ms",
            request_id,
            bids.len(),
            started.elapsed().as_millis()
        );
        BidResponse::new(request_id, bids, RtbStatus::Ok)
    }
}
