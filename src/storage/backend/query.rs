//! AdStore implementation for SeaOrmStorage
//!
//! All read-only queries used by the serving path.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, ExprTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::{debug, warn};

use super::converters::{
    model_to_campaign, model_to_external_source, model_to_fallback, model_to_ssp_config,
    model_to_vast_source, model_to_zone,
};
use super::{SeaOrmStorage, retry};
use crate::errors::{AdServerError, Result};
use crate::storage::AdStore;
use crate::storage::models::{ExternalCandidate, FallbackAd, SspConfig, VastCandidate, Zone};

use migration::entities::{
    campaign, external_campaign, fallback_ad, ssp_config, vast_campaign, zone,
};

/// 有效活动：active，未到期，预算未花完
fn eligible_campaign_condition() -> Condition {
    let now = Utc::now();
    Condition::all()
        .add(campaign::Column::Status.eq("active"))
        .add(
            Condition::any()
                .add(campaign::Column::EndDate.is_null())
                .add(campaign::Column::EndDate.gt(now)),
        )
        .add(
            Condition::any()
                .add(campaign::Column::Budget.is_null())
                .add(
                    Expr::col((campaign::Entity, campaign::Column::Spent))
                        .lt(Expr::col((campaign::Entity, campaign::Column::Budget))),
                ),
        )
}

#[async_trait]
impl AdStore for SeaOrmStorage {
    async fn find_zone(&self, zone_id: i64) -> Result<Option<Zone>> {
        let db = &self.db;
        let model = retry::with_retry(&format!("find_zone({})", zone_id), self.retry_config, || {
            zone::Entity::find_by_id(zone_id).one(db)
        })
        .await?;

        Ok(model.and_then(|m| {
            let raw_type = m.zone_type.clone();
            let zone = model_to_zone(m);
            if zone.is_none() {
                warn!(
                    "Zone {} has unrecognized type/status ('{}'), treating as missing",
                    zone_id, raw_type
                );
            }
            zone
        }))
    }

    async fn list_vast_candidates(&self, limit: u64) -> Result<Vec<VastCandidate>> {
        let db = &self.db;
        let rows = retry::with_retry("list_vast_candidates", self.retry_config, || {
            vast_campaign::Entity::find()
                .find_also_related(campaign::Entity)
                .filter(eligible_campaign_condition())
                .limit(limit)
                .all(db)
        })
        .await?;

        let now = Utc::now();
        let candidates: Vec<VastCandidate> = rows
            .into_iter()
            .filter_map(|(source, campaign)| {
                let campaign = model_to_campaign(campaign?)?;
                campaign.is_eligible(now).then(|| VastCandidate {
                    source: model_to_vast_source(source),
                    campaign,
                })
            })
            .collect();

        debug!("Loaded {} VAST candidates", candidates.len());
        Ok(candidates)
    }

    async fn list_external_candidates(&self, limit: u64) -> Result<Vec<ExternalCandidate>> {
        let db = &self.db;
        let rows = retry::with_retry("list_external_candidates", self.retry_config, || {
            external_campaign::Entity::find()
                .find_also_related(campaign::Entity)
                .filter(eligible_campaign_condition())
                .limit(limit)
                .all(db)
        })
        .await?;

        let now = Utc::now();
        let candidates: Vec<ExternalCandidate> = rows
            .into_iter()
            .filter_map(|(source, campaign)| {
                let campaign = model_to_campaign(campaign?)?;
                campaign.is_eligible(now).then(|| ExternalCandidate {
                    source: model_to_external_source(source),
                    campaign,
                })
            })
            .collect();

        debug!("Loaded {} external candidates", candidates.len());
        Ok(candidates)
    }

    async fn find_ssp_config(&self, publisher_id: i64) -> Result<Option<SspConfig>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("find_ssp_config({})", publisher_id),
            self.retry_config,
            || {
                ssp_config::Entity::find()
                    .filter(ssp_config::Column::PublisherId.eq(publisher_id))
                    .filter(ssp_config::Column::Status.eq("active"))
                    .one(db)
            },
        )
        .await?;

        Ok(model.and_then(model_to_ssp_config))
    }

    async fn top_fallback(&self, zone_id: i64) -> Result<Option<FallbackAd>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("top_fallback({})", zone_id),
            self.retry_config,
            || {
                fallback_ad::Entity::find()
                    .filter(fallback_ad::Column::ZoneId.eq(zone_id))
                    .filter(fallback_ad::Column::Status.eq("active"))
                    .order_by_desc(fallback_ad::Column::Priority)
                    .order_by_asc(fallback_ad::Column::Id)
                    .one(db)
            },
        )
        .await?;

        Ok(model.and_then(model_to_fallback))
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| AdServerError::database_connection(e.to_string()))
    }
}
