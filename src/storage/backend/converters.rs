//! Sea-ORM Model 与领域模型之间的转换
//!
//! 状态 / 类型列是自由文本，无法识别的值返回 `None`，由调用方决定跳过或报警。

use std::str::FromStr;

use sea_orm::ActiveValue::{NotSet, Set};

use crate::storage::models::{
    BidOrigin, Campaign, CampaignStatus, ExternalSource, FallbackAd, ImpressionEvent,
    RecordStatus, RtbBid, SspConfig, VastSource, Zone, ZoneType,
};
use migration::entities::{
    campaign, external_campaign, fallback_ad, impression, rtb_bid, ssp_config, vast_campaign,
    zone,
};

pub fn model_to_zone(model: zone::Model) -> Option<Zone> {
    Some(Zone {
        id: model.id,
        publisher_id: model.publisher_id,
        zone_type: ZoneType::from_str(&model.zone_type).ok()?,
        status: RecordStatus::from_str(&model.status).ok()?,
        impressions: model.impressions,
        clicks: model.clicks,
    })
}

pub fn model_to_campaign(model: campaign::Model) -> Option<Campaign> {
    Some(Campaign {
        id: model.id,
        status: CampaignStatus::from_str(&model.status).ok()?,
        budget: model.budget,
        spent: model.spent,
        end_date: model.end_date,
    })
}

pub fn model_to_vast_source(model: vast_campaign::Model) -> VastSource {
    VastSource {
        id: model.id,
        campaign_id: model.campaign_id,
        vast_url: model.vast_url,
        provider_name: model.provider_name,
    }
}

pub fn model_to_external_source(model: external_campaign::Model) -> ExternalSource {
    ExternalSource {
        id: model.id,
        campaign_id: model.campaign_id,
        endpoint_url: model.endpoint_url,
        endpoint_type: model.endpoint_type,
        api_key: model.api_key,
    }
}

pub fn model_to_ssp_config(model: ssp_config::Model) -> Option<SspConfig> {
    Some(SspConfig {
        id: model.id,
        publisher_id: model.publisher_id,
        endpoint_url: model.endpoint_url,
        api_key: model.api_key,
        status: RecordStatus::from_str(&model.status).ok()?,
    })
}

pub fn model_to_fallback(model: fallback_ad::Model) -> Option<FallbackAd> {
    Some(FallbackAd {
        id: model.id,
        zone_id: model.zone_id,
        vast_url: model.vast_url,
        priority: model.priority,
        status: RecordStatus::from_str(&model.status).ok()?,
    })
}

pub fn event_to_active_model(event: ImpressionEvent) -> impression::ActiveModel {
    impression::ActiveModel {
        id: NotSet,
        zone_id: Set(event.zone_id),
        campaign_id: Set(event.campaign_id),
        impression_id: Set(event.impression_id),
        event_type: Set(event.event_type.as_str().to_string()),
        source: Set(event.source.map(|s| s.as_ref().to_string())),
        user_ip: Set(event.user_ip),
        user_agent: Set(event.user_agent),
        referer: Set(event.referer),
        video_player_id: Set(event.video_player_id),
        created_at: Set(event.timestamp),
    }
}

pub fn bid_to_active_model(bid: RtbBid) -> rtb_bid::ActiveModel {
    let (external_campaign_id, ssp_config_id) = match bid.origin {
        BidOrigin::External(id) => (Some(id), None),
        BidOrigin::Ssp(id) => (None, Some(id)),
        BidOrigin::None => (None, None),
    };

    rtb_bid::ActiveModel {
        id: NotSet,
        zone_id: Set(bid.zone_id),
        external_campaign_id: Set(external_campaign_id),
        ssp_config_id: Set(ssp_config_id),
        bid_price: Set(bid.bid_price),
        bid_currency: Set(bid.currency),
        response_time_ms: Set(i32::try_from(bid.response_time_ms).unwrap_or(i32::MAX)),
        status: Set(bid.status.as_ref().to_string()),
        vast_url_response: Set(bid.vast_url),
        created_at: Set(bid.timestamp),
    }
}
