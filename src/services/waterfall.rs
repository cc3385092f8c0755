//! 广告决策瀑布流
//!
//! 每个请求按固定顺序尝试：Guard → Internal → External → SSP → Fallback。
//! 每个阶段只产出一种结果（`StageOutcome`），阶段之间严格串行，失败不重试。
//! 任何失败最终都转换为只含 `<Error>` 的 VAST 文档。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::bidder::BidClient;
use super::campaign_pool::CampaignPool;
use super::fetcher::{FetchError, VastFetcher};
use super::zone_store::ZoneStore;
use crate::config::{FeaturesConfig, ServingConfig};
use crate::events::EventManager;
use crate::storage::models::{
    BidOrigin, BidStatus, EventSource, EventType, ImpressionEvent, RtbBid,
};
use crate::storage::{AdStore, Zone};
use crate::vast::{TrackingTag, TrackingWrapper, VastDocument, error_document, fallback_wrapper};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServeError {
    #[error("missing zone_id")]
    MissingZoneId,
    #[error("zone not found")]
    ZoneNotFound,
    #[error("zone inactive")]
    ZoneInactive,
    #[error("zone is rtb-only")]
    ZoneTypeMismatch,
    #[error("source unreachable: {0}")]
    FetchUnreachable(String),
    #[error("source returned invalid VAST: {0}")]
    FetchInvalidVast(String),
    #[error("no eligible campaign")]
    NoEligibleCampaign,
    #[error("no bid available")]
    NoBidAvailable,
    #[error("all sources exhausted")]
    AllSourcesExhausted,
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ServeError {
    /// 写入 `<Error>` 的提示语
    pub fn player_message(&self) -> &'static str {
        match self {
            ServeError::MissingZoneId => "Missing required parameter: zone_id",
            ServeError::ZoneNotFound => "Zone not found",
            ServeError::ZoneInactive => "Zone is not active",
            ServeError::ZoneTypeMismatch => "This zone is RTB-only",
            ServeError::StoreUnavailable(_) => "Service temporarily unavailable",
            ServeError::FetchUnreachable(_)
            | ServeError::FetchInvalidVast(_)
            | ServeError::NoEligibleCampaign
            | ServeError::NoBidAvailable
            | ServeError::AllSourcesExhausted => {
                "No ads available at this moment. Please try again later."
            }
        }
    }
}

impl From<FetchError> for ServeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidVast(e) => ServeError::FetchInvalidVast(e.to_string()),
            other => ServeError::FetchUnreachable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Internal,
    External,
    Ssp,
    Fallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Internal => "internal",
            SourceKind::External => "external",
            SourceKind::Ssp => "ssp",
            SourceKind::Fallback => "fallback",
        }
    }

    fn event_source(&self) -> EventSource {
        match self {
            SourceKind::Internal => EventSource::Internal,
            SourceKind::External => EventSource::External,
            SourceKind::Ssp => EventSource::Ssp,
            SourceKind::Fallback => EventSource::Fallback,
        }
    }
}

/// 成功响应的来源标记
#[derive(Debug, Clone, PartialEq)]
pub struct Stamp {
    pub kind: SourceKind,
    pub campaign_id: Option<i64>,
    /// vast_campaigns / external_campaigns / ssp_configs / fallback_ads 中的 id
    pub source_id: i64,
    pub bid_price: Option<f64>,
}

#[derive(Debug)]
pub enum StageOutcome {
    Resolved(VastDocument, Stamp),
    Pass(ServeError),
    TerminalFailure(ServeError),
}

#[derive(Debug)]
pub enum WaterfallResult {
    Served {
        document: VastDocument,
        stamp: Stamp,
    },
    Failed {
        reason: ServeError,
        document: VastDocument,
    },
}

impl WaterfallResult {
    pub fn document(&self) -> &VastDocument {
        match self {
            WaterfallResult::Served { document, .. } | WaterfallResult::Failed { document, .. } => {
                document
            }
        }
    }

    pub fn into_document(self) -> VastDocument {
        match self {
            WaterfallResult::Served { document, .. } | WaterfallResult::Failed { document, .. } => {
                document
            }
        }
    }

    /// 只有存储不可用时才返回非 200
    pub fn is_store_outage(&self) -> bool {
        matches!(
            self,
            WaterfallResult::Failed {
                reason: ServeError::StoreUnavailable(_),
                ..
            }
        )
    }
}

/// 请求方信息，只用于事件记录
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub video_player_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServeRequest {
    pub zone_id: i64,
    pub impression_id: String,
    pub client: ClientContext,
}

#[derive(Debug, Clone)]
pub struct WaterfallSettings {
    pub base_url: String,
    pub vast_fetch_timeout: Duration,
    pub bid_timeout: Duration,
    pub ssp_enabled: bool,
}

impl WaterfallSettings {
    pub fn new(serving: &ServingConfig, features: &FeaturesConfig) -> Self {
        Self {
            base_url: serving.base_url.trim_end_matches('/').to_string(),
            vast_fetch_timeout: Duration::from_millis(serving.vast_fetch_timeout_ms),
            bid_timeout: Duration::from_millis(serving.bid_timeout_ms),
            ssp_enabled: features.ssp,
        }
    }
}

#[derive(Clone)]
pub struct WaterfallSelector {
    zones: ZoneStore,
    campaigns: CampaignPool,
    store: Arc<dyn AdStore>,
    fetcher: Arc<dyn VastFetcher>,
    bidder: Arc<dyn BidClient>,
    tracker: TrackingWrapper,
    events: EventManager,
    settings: WaterfallSettings,
}

impl WaterfallSelector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zones: ZoneStore,
        campaigns: CampaignPool,
        store: Arc<dyn AdStore>,
        fetcher: Arc<dyn VastFetcher>,
        bidder: Arc<dyn BidClient>,
        events: EventManager,
        settings: WaterfallSettings,
    ) -> Self {
        Self {
            zones,
            campaigns,
            store,
            fetcher,
            bidder,
            tracker: TrackingWrapper::new(settings.base_url.clone()),
            events,
            settings,
        }
    }

    pub async fn serve(&self, request: &ServeRequest) -> WaterfallResult {
        let started = Instant::now();

        let zone = match self.guard(request.zone_id).await {
            Ok(zone) => zone,
            Err(reason) => return self.fail(request, reason),
        };

        for kind in [SourceKind::Internal, SourceKind::External, SourceKind::Ssp] {
            let outcome = match kind {
                SourceKind::Internal => self.internal_stage(&zone, request).await,
                SourceKind::External => self.external_stage(&zone, request).await,
                _ => self.ssp_stage(&zone).await,
            };
            match outcome {
                StageOutcome::Resolved(document, stamp) => {
                    return self.succeed(request, document, stamp);
                }
                StageOutcome::Pass(reason) => {
                    debug!(
                        "Zone {} {} stage passed: {}",
                        zone.id,
                        kind.as_str(),
                        reason
                    );
                }
                StageOutcome::TerminalFailure(reason) => return self.fail(request, reason),
            }
        }

        // 主瀑布流全部落空，记一条零出价
        self.events.record_bid(RtbBid {
            zone_id: zone.id,
            origin: BidOrigin::None,
            bid_price: 0.0,
            currency: "USD".to_string(),
            response_time_ms: started.elapsed().as_millis() as u64,
            status: BidStatus::NoBid,
            vast_url: None,
            timestamp: Utc::now(),
        });

        match self.fallback_stage(&zone).await {
            StageOutcome::Resolved(document, stamp) => self.succeed(request, document, stamp),
            StageOutcome::Pass(reason) | StageOutcome::TerminalFailure(reason) => {
                debug!("Zone {} fallback stage failed: {}", zone.id, reason);
                self.fail(request, ServeError::AllSourcesExhausted)
            }
        }
    }

    /// zone 必须存在、active，且不是 rtb-only；全部是终止性失败
    async fn guard(&self, zone_id: i64) -> Result<Zone, ServeError> {
        let zone = self
            .zones
            .resolve(zone_id)
            .await
            .map_err(|e| ServeError::StoreUnavailable(e.to_string()))?
            .ok_or(ServeError::ZoneNotFound)?;

        if !zone.is_active() {
            return Err(ServeError::ZoneInactive);
        }
        if !zone.serves_vast() {
            return Err(ServeError::ZoneTypeMismatch);
        }
        Ok(zone)
    }

    async fn internal_stage(&self, zone: &Zone, request: &ServeRequest) -> StageOutcome {
        let candidate = match self.campaigns.pick_vast().await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return StageOutcome::Pass(ServeError::NoEligibleCampaign),
            Err(e) => {
                warn!("Zone {} internal candidates unavailable: {}", zone.id, e);
                return StageOutcome::Pass(ServeError::StoreUnavailable(e.to_string()));
            }
        };

        let source = &candidate.source;
        match self
            .fetcher
            .fetch(&source.vast_url, self.settings.vast_fetch_timeout)
            .await
        {
            Ok(document) => {
                let wrapped = self.tracker.wrap(
                    &document,
                    &TrackingTag {
                        zone_id: zone.id,
                        campaign_id: Some(source.campaign_id),
                        impression_id: &request.impression_id,
                        kind: SourceKind::Internal.as_str(),
                    },
                );
                StageOutcome::Resolved(
                    wrapped,
                    Stamp {
                        kind: SourceKind::Internal,
                        campaign_id: Some(source.campaign_id),
                        source_id: source.id,
                        bid_price: None,
                    },
                )
            }
            Err(e) => {
                warn!(
                    "Internal VAST fetch failed for campaign {} ({}): {}",
                    source.campaign_id, source.provider_name, e
                );
                self.events.record(self.event(
                    request,
                    EventType::Error,
                    Some(source.campaign_id),
                    Some(EventSource::Internal),
                ));
                StageOutcome::Pass(e.into())
            }
        }
    }

    async fn external_stage(&self, zone: &Zone, request: &ServeRequest) -> StageOutcome {
        if !zone.accepts_partners() {
            return StageOutcome::Pass(ServeError::NoBidAvailable);
        }

        let candidate = match self.campaigns.pick_external().await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return StageOutcome::Pass(ServeError::NoEligibleCampaign),
            Err(e) => {
                warn!("Zone {} external candidates unavailable: {}", zone.id, e);
                return StageOutcome::Pass(ServeError::StoreUnavailable(e.to_string()));
            }
        };

        let source = &candidate.source;
        let bid = match self
            .bidder
            .request_bid(
                &source.endpoint_url,
                &source.api_key,
                zone.id,
                self.settings.bid_timeout,
            )
            .await
        {
            Ok(bid) => bid,
            Err(e) => {
                debug!("External partner {} gave no bid: {}", source.id, e);
                return StageOutcome::Pass(ServeError::NoBidAvailable);
            }
        };

        let document = match self
            .fetcher
            .fetch(&bid.vast_url, self.settings.vast_fetch_timeout)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                debug!("External partner {} VAST fetch failed: {}", source.id, e);
                return StageOutcome::Pass(e.into());
            }
        };

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

        let wrapped = self.tracker.wrap(
            &document,
            &TrackingTag {
                zone_id: zone.id,
                campaign_id: Some(source.campaign_id),
                impression_id: &request.impression_id,
                kind: SourceKind::External.as_str(),
            },
        );
        StageOutcome::Resolved(
            wrapped,
            Stamp {
                kind: SourceKind::External,
                campaign_id: Some(source.campaign_id),
                source_id: source.id,
                bid_price: Some(bid.bid_price),
            },
        )
    }

    /// SSP 自带跟踪，原样返回
    async fn ssp_stage(&self, zone: &Zone) -> StageOutcome {
        if !zone.accepts_partners() || !self.settings.ssp_enabled {
            return StageOutcome::Pass(ServeError::NoBidAvailable);
        }

        let ssp = match self.store.find_ssp_config(zone.publisher_id).await {
            Ok(Some(ssp)) => ssp,
            Ok(None) => return StageOutcome::Pass(ServeError::NoBidAvailable),
            Err(e) => {
                warn!("Zone {} SSP config unavailable: {}", zone.id, e);
                return StageOutcome::Pass(ServeError::StoreUnavailable(e.to_string()));
            }
        };

        let bid = match self
            .bidder
            .request_bid(
                &ssp.endpoint_url,
                &ssp.api_key,
                zone.id,
                self.settings.bid_timeout,
            )
            .await
        {
            Ok(bid) => bid,
            Err(e) => {
                debug!("SSP {} gave no bid: {}", ssp.id, e);
                return StageOutcome::Pass(ServeError::NoBidAvailable);
            }
        };

        match self
            .fetcher
            .fetch(&bid.vast_url, self.settings.vast_fetch_timeout)
            .await
        {
            Ok(document) => {
                self.events.record_bid(RtbBid {
                    zone_id: zone.id,
                    origin: BidOrigin::Ssp(ssp.id),
                    bid_price: bid.bid_price,
                    currency: bid.currency.clone(),
                    response_time_ms: bid.response_time_ms,
                    status: BidStatus::Success,
                    vast_url: Some(bid.vast_url.clone()),
                    timestamp: Utc::now(),
                });
                StageOutcome::Resolved(
                    document,
                    Stamp {
                        kind: SourceKind::Ssp,
                        campaign_id: None,
                        source_id: ssp.id,
                        bid_price: Some(bid.bid_price),
                    },
                )
            }
            Err(e) => {
                debug!("SSP {} VAST fetch failed: {}", ssp.id, e);
                StageOutcome::Pass(e.into())
            }
        }
    }

    async fn fallback_stage(&self, zone: &Zone) -> StageOutcome {
        let fallback = match self.store.top_fallback(zone.id).await {
            Ok(Some(fallback)) => fallback,
            Ok(None) => return StageOutcome::TerminalFailure(ServeError::AllSourcesExhausted),
            Err(e) => {
                warn!("Zone {} fallback unavailable: {}", zone.id, e);
                return StageOutcome::TerminalFailure(ServeError::StoreUnavailable(
                    e.to_string(),
                ));
            }
        };

        if let Err(e) = self
            .fetcher
            .fetch(&fallback.vast_url, self.settings.vast_fetch_timeout)
            .await
        {
            warn!("Fallback ad {} for zone {} failed: {}", fallback.id, zone.id, e);
            return StageOutcome::TerminalFailure(e.into());
        }

        let document = fallback_wrapper(
            &self.settings.base_url,
            zone.id,
            fallback.id,
            &fallback.vast_url,
        );
        StageOutcome::Resolved(
            document,
            Stamp {
                kind: SourceKind::Fallback,
                campaign_id: None,
                source_id: fallback.id,
                bid_price: None,
            },
        )
    }

    fn succeed(&self, request: &ServeRequest, document: VastDocument, stamp: Stamp) -> WaterfallResult {
        info!(
            "Served zone {} from {} source {} (impression {})",
            request.zone_id,
            stamp.kind.as_str(),
            stamp.source_id,
            request.impression_id
        );
        self.events.record(self.event(
            request,
            EventType::Impression,
            stamp.campaign_id,
            Some(stamp.kind.event_source()),
        ));
        WaterfallResult::Served { document, stamp }
    }

    fn fail(&self, request: &ServeRequest, reason: ServeError) -> WaterfallResult {
        match reason {
            ServeError::StoreUnavailable(_) => {
                warn!("Zone {} request failed: {}", request.zone_id, reason);
            }
            _ => {
                info!("Zone {} request failed: {}", request.zone_id, reason);
                self.events
                    .record(self.event(request, EventType::Error, None, None));
            }
        }
        WaterfallResult::Failed {
            document: error_document(reason.player_message()),
            reason,
        }
    }

    fn event(
        &self,
        request: &ServeRequest,
        event_type: EventType,
        campaign_id: Option<i64>,
        source: Option<EventSource>,
    ) -> ImpressionEvent {
        ImpressionEvent {
            zone_id: request.zone_id,
            campaign_id,
            impression_id: request.impression_id.clone(),
            event_type,
            source,
            user_ip: request.client.user_ip.clone(),
            user_agent: request.client.user_agent.clone(),
            referer: request.client.referer.clone(),
            video_player_id: request.client.video_player_id.clone(),
            timestamp: Utc::now(),
        }
    }
}
