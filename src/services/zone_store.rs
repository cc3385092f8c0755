//! Zone 解析（带 TTL 缓存）

use std::sync::Arc;

use tracing::trace;

use crate::cache::{CacheResult, ObjectCache};
use crate::errors::Result;
use crate::storage::{AdStore, Zone};

#[derive(Clone)]
pub struct ZoneStore {
    store: Arc<dyn AdStore>,
    cache: Arc<dyn ObjectCache<i64, Zone>>,
}

impl ZoneStore {
    pub fn new(store: Arc<dyn AdStore>, cache: Arc<dyn ObjectCache<i64, Zone>>) -> Self {
        Self { store, cache }
    }

    /// 命中缓存不访问存储；未命中读一次存储并回填。
    /// 不存在的 zone 不缓存。`Err` 只表示存储不可用。
    pub async fn resolve(&self, zone_id: i64) -> Result<Option<Zone>> {
        if let CacheResult::Found(zone) = self.cache.get(&zone_id).await {
            trace!("Zone cache hit: {}", zone_id);
            return Ok(Some(zone));
        }

        trace!("Zone cache miss: {}", zone_id);
        let zone = self.store.find_zone(zone_id).await?;
        if let Some(ref zone) = zone {
            self.cache.insert(zone_id, zone.clone()).await;
        }
        Ok(zone)
    }
}
