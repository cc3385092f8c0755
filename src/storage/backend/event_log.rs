//! EventLog implementation for SeaOrmStorage

use async_trait::async_trait;
use sea_orm::EntityTrait;
use tracing::trace;

use super::SeaOrmStorage;
use super::converters::{bid_to_active_model, event_to_active_model};
use super::retry;
use crate::events::EventLog;
use crate::storage::models::{ImpressionEvent, RtbBid};

use migration::entities::{impression, rtb_bid};

#[async_trait]
impl EventLog for SeaOrmStorage {
    async fn log_event(&self, event: ImpressionEvent) -> anyhow::Result<()> {
        let zone_id = event.zone_id;
        let model = event_to_active_model(event);

        let db = &self.db;
        retry::with_retry("log_event", self.retry_config, || async {
            impression::Entity::insert(model.clone()).exec(db).await
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to insert impression event: {}", e))?;

        trace!("Impression event written for zone {}", zone_id);
        Ok(())
    }

    async fn log_bid(&self, bid: RtbBid) -> anyhow::Result<()> {
        let zone_id = bid.zone_id;
        let model = bid_to_active_model(bid);

        let db = &self.db;
        retry::with_retry("log_bid", self.retry_config, || async {
            rtb_bid::Entity::insert(model.clone()).exec(db).await
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to insert rtb bid: {}", e))?;

        trace!("RTB bid written for zone {}", zone_id);
        Ok(())
    }
}
