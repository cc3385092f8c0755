//! 投放引擎使用的领域模型
//!
//! 这些结构只描述核心读取 / 写入的字段，管理后台的完整 schema 不在这里。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// zone 类型
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ZoneType {
    Vast,
    Rtb,
    Both,
}

/// 通用启用状态（zone / ssp / fallback）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RecordStatus {
    Active,
    Inactive,
}

/// 广告活动状态
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CampaignStatus {
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    pub publisher_id: i64,
    pub zone_type: ZoneType,
    pub status: RecordStatus,
    pub impressions: i64,
    pub clicks: i64,
}

impl Zone {
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// rtb-only zone 不直接返回 inline VAST
    pub fn serves_vast(&self) -> bool {
        matches!(self.zone_type, ZoneType::Vast | ZoneType::Both)
    }

    pub fn accepts_partners(&self) -> bool {
        self.zone_type == ZoneType::Both
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub status: CampaignStatus,
    pub budget: Option<f64>,
    pub spent: f64,
    pub end_date: Option<DateTime<Utc>>,
}

impl Campaign {
    /// active，未到期，预算未花完
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Active
            && self.end_date.is_none_or(|end| end > now)
            && self.budget.is_none_or(|budget| self.spent < budget)
    }
}

/// 可直接 GET 的 VAST 地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VastSource {
    pub id: i64,
    pub campaign_id: i64,
    pub vast_url: String,
    pub provider_name: String,
}

/// 需要先 POST 竞价请求才能拿到 VAST 地址的合作方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSource {
    pub id: i64,
    pub campaign_id: i64,
    pub endpoint_url: String,
    pub endpoint_type: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SspConfig {
    pub id: i64,
    pub publisher_id: i64,
    pub endpoint_url: String,
    pub api_key: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackAd {
    pub id: i64,
    pub zone_id: i64,
    pub vast_url: String,
    pub priority: i32,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VastCandidate {
    pub source: VastSource,
    pub campaign: Campaign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCandidate {
    pub source: ExternalSource,
    pub campaign: Campaign,
}

/// 事件类型
///
/// 跟踪像素的 `event` 参数是播放器传来的任意字符串，未知值原样保留。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Impression,
    Click,
    Error,
    Fallback,
    Other(String),
}

impl EventType {
    pub fn parse(value: &str) -> Self {
        match value {
            "impression" => EventType::Impression,
            "click" => EventType::Click,
            "error" => EventType::Error,
            "fallback" => EventType::Fallback,
            other => EventType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::Impression => "impression",
            EventType::Click => "click",
            EventType::Error => "error",
            EventType::Fallback => "fallback",
            EventType::Other(s) => s,
        }
    }

    /// 会同时累加 zone 计数器的事件
    pub fn counter_field(&self) -> Option<CounterField> {
        match self {
            EventType::Impression => Some(CounterField::Impressions),
            EventType::Click => Some(CounterField::Clicks),
            _ => None,
        }
    }
}

/// 事件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EventSource {
    Internal,
    External,
    Ssp,
    Fallback,
    Tracking,
    Click,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionEvent {
    pub zone_id: i64,
    pub campaign_id: Option<i64>,
    pub impression_id: String,
    pub event_type: EventType,
    pub source: Option<EventSource>,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub video_player_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// zone 上的累加计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CounterField {
    Impressions,
    Clicks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterUpdate {
    pub zone_id: i64,
    pub field: CounterField,
    pub delta: u64,
}

/// 出价来自哪类合作方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidOrigin {
    External(i64),
    Ssp(i64),
    /// 整个主瀑布流都没有出价
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BidStatus {
    Success,
    NoBid,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RtbBid {
    pub zone_id: i64,
    pub origin: BidOrigin,
    pub bid_price: f64,
    pub currency: String,
    pub response_time_ms: u64,
    pub status: BidStatus,
    pub vast_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn campaign() -> Campaign {
        Campaign {
            id: 1,
            status: CampaignStatus::Active,
            budget: None,
            spent: 0.0,
            end_date: None,
        }
    }

    #[test]
    fn test_campaign_eligibility() {
        let now = Utc::now();
        assert!(campaign().is_eligible(now));

        let paused = Campaign {
            status: CampaignStatus::Paused,
            ..campaign()
        };
        assert!(!paused.is_eligible(now));

        let ended = Campaign {
            end_date: Some(now - Duration::hours(1)),
            ..campaign()
        };
        assert!(!ended.is_eligible(now));

        let running = Campaign {
            end_date: Some(now + Duration::hours(1)),
            ..campaign()
        };
        assert!(running.is_eligible(now));
    }

    #[test]
    fn test_campaign_budget() {
        let now = Utc::now();
        let spent = Campaign {
            budget: Some(100.0),
            spent: 100.0,
            ..campaign()
        };
        assert!(!spent.is_eligible(now));

        let under = Campaign {
            budget: Some(100.0),
            spent: 99.5,
            ..campaign()
        };
        assert!(under.is_eligible(now));
    }

    #[test]
    fn test_zone_type_parsing() {
        assert_eq!(ZoneType::from_str("both").unwrap(), ZoneType::Both);
        assert_eq!(ZoneType::from_str("RTB").unwrap(), ZoneType::Rtb);
        assert!(ZoneType::from_str("banner").is_err());
        assert_eq!(ZoneType::Vast.as_ref(), "vast");
    }

    #[test]
    fn test_event_type_roundtrip() {
        assert_eq!(EventType::parse("click"), EventType::Click);
        assert_eq!(
            EventType::parse("firstQuartile"),
            EventType::Other("firstQuartile".to_string())
        );
        assert_eq!(EventType::parse("firstQuartile").as_str(), "firstQuartile");
        assert_eq!(
            EventType::Impression.counter_field(),
            Some(CounterField::Impressions)
        );
        assert_eq!(EventType::Fallback.counter_field(), None);
    }

    #[test]
    fn test_bid_status_names() {
        assert_eq!(BidStatus::NoBid.as_ref(), "no_bid");
        assert_eq!(BidStatus::Success.as_ref(), "success");
    }
}
