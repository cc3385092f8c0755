//! 集成测试共用的内存实现
//!
//! 存储、VAST 拉取、竞价客户端、事件 sink 全部替换为可断言调用次数的假实现。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use adserver::cache::{NullObjectCache, ObjectCache};
use adserver::config::{FeaturesConfig, ServingConfig};
use adserver::errors::{AdServerError, Result};
use adserver::events::{CounterSink, EventLog, EventManager, EventSettings};
use adserver::services::{
    BidClient, BidError, BidSource, CampaignPool, FetchError, PartnerBid, PartnerBidSource,
    RtbResponder, VastFetcher, WaterfallSelector, WaterfallSettings, ZoneStore,
};
use adserver::storage::models::{
    Campaign, CampaignStatus, CounterUpdate, ExternalCandidate, ExternalSource, FallbackAd,
    ImpressionEvent, RecordStatus, RtbBid, SspConfig, VastCandidate, VastSource, Zone, ZoneType,
};
use adserver::storage::AdStore;
use adserver::vast::VastDocument;

pub const BASE_URL: &str = "https://ads.test";

pub const INLINE_VAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="4.2">
  <Ad id="creative-1">
    <InLine>
      <AdSystem>Partner</AdSystem>
      <AdTitle>Spot</AdTitle>
      <Impression><![CDATA[https://partner.example/imp]]></Impression>
      <Creatives>
        <Creative>
          <Linear>
            <Duration>00:00:15</Duration>
            <MediaFiles>
              <MediaFile delivery="progressive" type="video/mp4" width="640" height="360"><![CDATA[https://cdn.example/spot.mp4]]></MediaFile>
            </MediaFiles>
          </Linear>
        </Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#;

// ============================================================
// Fixtures
// ============================================================

pub fn zone(id: i64, zone_type: ZoneType) -> Zone {
    Zone {
        id,
        publisher_id: 100,
        zone_type,
        status: RecordStatus::Active,
        impressions: 0,
        clicks: 0,
    }
}

pub fn active_campaign(id: i64) -> Campaign {
    Campaign {
        id,
        status: CampaignStatus::Active,
        budget: None,
        spent: 0.0,
        end_date: None,
    }
}

pub fn vast_candidate(id: i64, campaign_id: i64, url: &str) -> VastCandidate {
    VastCandidate {
        source: VastSource {
            id,
            campaign_id,
            vast_url: url.to_string(),
            provider_name: "test".to_string(),
        },
        campaign: active_campaign(campaign_id),
    }
}

pub fn external_candidate(id: i64, campaign_id: i64, endpoint: &str) -> ExternalCandidate {
    ExternalCandidate {
        source: ExternalSource {
            id,
            campaign_id,
            endpoint_url: endpoint.to_string(),
            endpoint_type: "vast".to_string(),
            api_key: "secret".to_string(),
        },
        campaign: active_campaign(campaign_id),
    }
}

pub fn fallback(id: i64, zone_id: i64, url: &str) -> FallbackAd {
    FallbackAd {
        id,
        zone_id,
        vast_url: url.to_string(),
        priority: 10,
        status: RecordStatus::Active,
    }
}

pub fn ssp(id: i64, publisher_id: i64, endpoint: &str) -> SspConfig {
    SspConfig {
        id,
        publisher_id,
        endpoint_url: endpoint.to_string(),
        api_key: "ssp-key".to_string(),
        status: RecordStatus::Active,
    }
}

pub fn partner_bid(vast_url: &str, price: f64) -> PartnerBid {
    PartnerBid {
        vast_url: vast_url.to_string(),
        bid_price: price,
        currency: "USD".to_string(),
        response_time_ms: 12,
    }
}

// ============================================================
// AdStore
// ============================================================

#[derive(Default)]
pub struct FakeStore {
    pub zones: Mutex<HashMap<i64, Zone>>,
    pub vast: Mutex<Vec<VastCandidate>>,
    pub external: Mutex<Vec<ExternalCandidate>>,
    pub ssp: Mutex<HashMap<i64, SspConfig>>,
    pub fallbacks: Mutex<HashMap<i64, FallbackAd>>,
    pub unavailable: AtomicBool,
    pub zone_reads: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_zone(self: &Arc<Self>, zone: Zone) -> Arc<Self> {
        self.zones.lock().unwrap().insert(zone.id, zone);
        Arc::clone(self)
    }

    pub fn add_vast(&self, candidate: VastCandidate) {
        self.vast.lock().unwrap().push(candidate);
    }

    pub fn add_external(&self, candidate: ExternalCandidate) {
        self.external.lock().unwrap().push(candidate);
    }

    pub fn set_ssp(&self, config: SspConfig) {
        self.ssp.lock().unwrap().insert(config.publisher_id, config);
    }

    pub fn set_fallback(&self, ad: FallbackAd) {
        self.fallbacks.lock().unwrap().insert(ad.zone_id, ad);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AdServerError::database_connection("store is down"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AdStore for FakeStore {
    async fn find_zone(&self, zone_id: i64) -> Result<Option<Zone>> {
        self.zone_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.zones.lock().unwrap().get(&zone_id).cloned())
    }

    async fn list_vast_candidates(&self, limit: u64) -> Result<Vec<VastCandidate>> {
        self.check()?;
        Ok(self
            .vast
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_external_candidates(&self, limit: u64) -> Result<Vec<ExternalCandidate>> {
        self.check()?;
        Ok(self
            .external
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_ssp_config(&self, publisher_id: i64) -> Result<Option<SspConfig>> {
        self.check()?;
        Ok(self.ssp.lock().unwrap().get(&publisher_id).cloned())
    }

    async fn top_fallback(&self, zone_id: i64) -> Result<Option<FallbackAd>> {
        self.check()?;
        Ok(self.fallbacks.lock().unwrap().get(&zone_id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

// ============================================================
// VastFetcher
// ============================================================

/// 按 URL 返回预设内容；未登记的 URL 视为不可达
#[derive(Default)]
pub struct FakeFetcher {
    pub bodies: Mutex<HashMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called(&self, url: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|u| u == url)
    }
}

#[async_trait]
impl VastFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> std::result::Result<VastDocument, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self.bodies.lock().unwrap().get(url).cloned();
        match body {
            Some(body) => Ok(VastDocument::parse(&body)?),
            None => Err(FetchError::Unreachable(format!("no route to {}", url))),
        }
    }
}

// ============================================================
// BidClient
// ============================================================

#[derive(Default)]
pub struct FakeBidder {
    pub replies: Mutex<HashMap<String, std::result::Result<PartnerBid, BidError>>>,
    pub calls: Mutex<Vec<(String, String, i64)>>,
}

impl FakeBidder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, endpoint: &str, reply: std::result::Result<PartnerBid, BidError>) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BidClient for FakeBidder {
    async fn request_bid(
        &self,
        endpoint: &str,
        api_key: &str,
        zone_id: i64,
        _timeout: Duration,
    ) -> std::result::Result<PartnerBid, BidError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), api_key.to_string(), zone_id));
        self.replies
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| Err(BidError::Transport("connection refused".to_string())))
    }
}

// ============================================================
// Event sinks
// ============================================================

#[derive(Default)]
pub struct RecordingSink {
    pub counter_batches: Mutex<Vec<Vec<CounterUpdate>>>,
    pub events: Mutex<Vec<ImpressionEvent>>,
    pub bids: Mutex<Vec<RtbBid>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ImpressionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn bids(&self) -> Vec<RtbBid> {
        self.bids.lock().unwrap().clone()
    }

    pub fn counter_batches(&self) -> Vec<Vec<CounterUpdate>> {
        self.counter_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CounterSink for RecordingSink {
    async fn flush_counters(&self, updates: Vec<CounterUpdate>) -> anyhow::Result<()> {
        self.counter_batches.lock().unwrap().push(updates);
        Ok(())
    }
}

#[async_trait]
impl EventLog for RecordingSink {
    async fn log_event(&self, event: ImpressionEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn log_bid(&self, bid: RtbBid) -> anyhow::Result<()> {
        self.bids.lock().unwrap().push(bid);
        Ok(())
    }
}

// ============================================================
// Wiring
// ============================================================

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub bidder: Arc<FakeBidder>,
    pub sink: Arc<RecordingSink>,
    pub events: EventManager,
    pub waterfall: WaterfallSelector,
    pub rtb: RtbResponder,
}

fn null_cache<K, V>() -> Arc<dyn ObjectCache<K, V>>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Arc::new(NullObjectCache::new())
}

impl Harness {
    pub fn new(store: Arc<FakeStore>) -> Self {
        Self::with_features(store, FeaturesConfig::default())
    }

    pub fn with_features(store: Arc<FakeStore>, features: FeaturesConfig) -> Self {
        let fetcher = FakeFetcher::new();
        let bidder = FakeBidder::new();
        let sink = RecordingSink::new();

        let (events, _worker) =
            EventManager::start(sink.clone(), sink.clone(), EventSettings::default());

        let ad_store: Arc<dyn AdStore> = store.clone();
        let zones = ZoneStore::new(ad_store.clone(), null_cache());
        let campaigns = CampaignPool::new(ad_store.clone(), null_cache(), null_cache(), 20);

        let serving = ServingConfig {
            base_url: BASE_URL.to_string(),
            ..ServingConfig::default()
        };
        let settings = WaterfallSettings::new(&serving, &features);

        let waterfall = WaterfallSelector::new(
            zones.clone(),
            campaigns.clone(),
            ad_store,
            fetcher.clone(),
            bidder.clone(),
            events.clone(),
            settings.clone(),
        );
        let sources: Vec<Arc<dyn BidSource>> = vec![Arc::new(PartnerBidSource::new(
            campaigns,
            bidder.clone(),
            events.clone(),
            settings.bid_timeout,
        ))];
        let rtb = RtbResponder::new(zones, sources);

        Self {
            store,
            fetcher,
            bidder,
            sink,
            events,
            waterfall,
            rtb,
        }
    }

    /// 等待队列中的事件全部写入
    pub async fn settle(&self) {
        self.events.flush().await.expect("event worker running");
    }
}
