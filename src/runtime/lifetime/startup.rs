use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::services::{AppStartTime, ServeContext};
use crate::cache::build_object_cache;
use crate::config::StaticConfig;
use crate::events::{CounterSink, EventLog, EventManager, EventSettings};
use crate::services::{
    BidClient, BidSource, CampaignPool, HttpBidClient, HttpVastFetcher, PartnerBidSource,
    RtbResponder, VastFetcher, WaterfallSelector, WaterfallSettings, ZoneStore,
};
use crate::storage::{AdStore, SeaOrmStorage, StorageFactory};

pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub events: EventManager,
    pub event_worker: JoinHandle<()>,
    pub serve: web::Data<ServeContext>,
}

/// 准备服务器启动的上下文
///
/// 顺序：存储（连接 + 迁移）→ 缓存 → 事件 worker → 投放服务
pub async fn prepare_server_startup(
    config: &StaticConfig,
    start_time: AppStartTime,
) -> Result<StartupContext> {
    let started = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let store: Arc<dyn AdStore> = storage.clone();
    let counter_sink: Arc<dyn CounterSink> = storage.clone();
    let event_log: Arc<dyn EventLog> = storage.clone();

    // 事件 worker
    let (events, event_worker) =
        EventManager::start(counter_sink, event_log, EventSettings::from(&config.events));
    debug!(
        "EventManager started (threshold {}, interval {}s)",
        config.events.flush_threshold, config.events.flush_interval_secs
    );

    // 缓存
    let zone_ttl = Duration::from_secs(config.cache.zone_ttl_secs);
    let campaign_ttl = Duration::from_secs(config.cache.campaign_ttl_secs);
    let zones = ZoneStore::new(
        store.clone(),
        build_object_cache("zones", &config.cache, zone_ttl),
    );
    let campaigns = CampaignPool::new(
        store.clone(),
        build_object_cache("vast_candidates", &config.cache, campaign_ttl),
        build_object_cache("external_candidates", &config.cache, campaign_ttl),
        config.serving.max_candidates,
    );
    if !config.cache.enabled {
        info!("Caching is disabled, every lookup reads the database");
    }

    // 上游客户端
    let fetcher: Arc<dyn VastFetcher> = Arc::new(HttpVastFetcher::new(&config.serving.user_agent));
    let bidder: Arc<dyn BidClient> = Arc::new(HttpBidClient::new(&config.serving.user_agent));

    let settings = WaterfallSettings::new(&config.serving, &config.features);
    let waterfall = WaterfallSelector::new(
        zones.clone(),
        campaigns.clone(),
        store.clone(),
        fetcher,
        bidder.clone(),
        events.clone(),
        settings.clone(),
    );

    let sources: Vec<Arc<dyn BidSource>> = vec![Arc::new(PartnerBidSource::new(
        campaigns,
        bidder,
        events.clone(),
        settings.bid_timeout,
    ))];
    let rtb = RtbResponder::new(zones, sources);

    if !config.features.rtb_enabled() {
        info!("RTB endpoint is disabled by configuration");
    }
    if !config.features.ssp {
        info!("SSP stage is disabled by configuration");
    }

    let serve = web::Data::new(ServeContext {
        waterfall,
        rtb,
        events: events.clone(),
        store,
        features: config.features.clone(),
        caching: config.cache.enabled,
        start_time,
    });

    debug!(
        "Pre-startup processing completed in {} ms",
        started.elapsed().as_millis()
    );

    Ok(StartupContext {
        storage,
        events,
        event_worker,
        serve,
    })
}
