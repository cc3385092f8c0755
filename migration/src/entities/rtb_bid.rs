//! Per-attempt bid log, written whether or not the bid won

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rtb_bids")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub zone_id: i64,
    pub external_campaign_id: Option<i64>,
    pub ssp_config_id: Option<i64>,
    #[sea_orm(column_type = "Double")]
    pub bid_price: f64,
    pub bid_currency: String,
    pub response_time_ms: i32,
    /// success | no_bid | failed
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub vast_url_response: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
