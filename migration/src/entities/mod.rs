pub mod campaign;
pub mod external_campaign;
pub mod fallback_ad;
pub mod impression;
pub mod rtb_bid;
pub mod ssp_config;
pub mod vast_campaign;
pub mod zone;

pub use campaign::Entity as CampaignEntity;
pub use external_campaign::Entity as ExternalCampaignEntity;
pub use fallback_ad::Entity as FallbackAdEntity;
pub use impression::Entity as ImpressionEntity;
pub use rtb_bid::Entity as RtbBidEntity;
pub use ssp_config::Entity as SspConfigEntity;
pub use vast_campaign::Entity as VastCampaignEntity;
pub use zone::Entity as ZoneEntity;
