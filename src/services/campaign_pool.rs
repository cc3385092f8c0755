//! 候选广告池
//!
//! 候选列表整体缓存（默认 10 分钟），每次选取时再按当前时间过滤一遍，
//! 缓存期内到期的活动不会被选中。

use std::sync::Arc;

use chrono::Utc;
use tracing::trace;

use crate::cache::{CacheResult, ObjectCache};
use crate::errors::Result;
use crate::storage::{AdStore, ExternalCandidate, VastCandidate};

pub type VastCandidateCache = Arc<dyn ObjectCache<(), Arc<Vec<VastCandidate>>>>;
pub type ExternalCandidateCache = Arc<dyn ObjectCache<(), Arc<Vec<ExternalCandidate>>>>;

#[derive(Clone)]
pub struct CampaignPool {
    store: Arc<dyn AdStore>,
    vast_cache: VastCandidateCache,
    external_cache: ExternalCandidateCache,
    max_candidates: u64,
}

/// 从列表中均匀随机选一个
fn pick_uniform<T: Clone>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    items.get(rand::random_range(0..items.len())).cloned()
}

impl CampaignPool {
    pub fn new(
        store: Arc<dyn AdStore>,
        vast_cache: VastCandidateCache,
        external_cache: ExternalCandidateCache,
        max_candidates: u64,
    ) -> Self {
        Self {
            store,
            vast_cache,
            external_cache,
            max_candidates,
        }
    }

    pub async fn vast_candidates(&self) -> Result<Arc<Vec<VastCandidate>>> {
        if let CacheResult::Found(list) = self.vast_cache.get(&()).await {
            trace!("VAST candidate cache hit ({} entries)", list.len());
            return Ok(list);
        }

        let list = Arc::new(self.store.list_vast_candidates(self.max_candidates).await?);
        if !list.is_empty() {
            self.vast_cache.insert((), Arc::clone(&list)).await;
        }
        Ok(list)
    }

    pub async fn external_candidates(&self) -> Result<Arc<Vec<ExternalCandidate>>> {
        if let CacheResult::Found(list) = self.external_cache.get(&()).await {
            trace!("External candidate cache hit ({} entries)", list.len());
            return Ok(list);
        }

        let list = Arc::new(
            self.store
                .list_external_candidates(self.max_candidates)
                .await?,
        );
        if !list.is_empty() {
            self.external_cache.insert((), Arc::clone(&list)).await;
        }
        Ok(list)
    }

    /// 在当前仍然有效的内部候选中均匀随机选一个
    pub async fn pick_vast(&self) -> Result<Option<VastCandidate>> {
        let now = Utc::now();
        let list = self.vast_candidates().await?;
        let eligible: Vec<VastCandidate> = list
            .iter()
            .filter(|c| c.campaign.is_eligible(now))
            .cloned()
            .collect();
        Ok(pick_uniform(&eligible))
    }

    /// 在当前仍然有效的外部合作方中均匀随机选一个
    pub async fn pick_external(&self) -> Result<Option<ExternalCandidate>> {
        let now = Utc::now();
        let list = self.external_candidates().await?;
        let eligible: Vec<ExternalCandidate> = list
            .iter()
            .filter(|c| c.campaign.is_eligible(now))
            .cloned()
            .collect();
        Ok(pick_uniform(&eligible))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::cache::MokaObjectCache;
    use crate::storage::models::CampaignStatus;
    use crate::storage::{Campaign, ExternalSource, FallbackAd, SspConfig, VastSource, Zone};

    #[derive(Default)]
    struct ListStore {
        vast: Mutex<Vec<VastCandidate>>,
        external: Mutex<Vec<ExternalCandidate>>,
        vast_reads: AtomicUsize,
        external_reads: AtomicUsize,
    }

    #[async_trait]
    impl AdStore for ListStore {
        async fn find_zone(&self, _zone_id: i64) -> Result<Option<Zone>> {
            Ok(None)
        }

        async fn list_vast_candidates(&self, limit: u64) -> Result<Vec<VastCandidate>> {
            self.vast_reads.fetch_add(1, Ordering::SeqCst);
            let list = self.vast.lock().unwrap();
            Ok(list.iter().take(limit as usize).cloned().collect())
        }

        async fn list_external_candidates(&self, limit: u64) -> Result<Vec<ExternalCandidate>> {
            self.external_reads.fetch_add(1, Ordering::SeqCst);
            let list = self.external.lock().unwrap();
            Ok(list.iter().take(limit as usize).cloned().collect())
        }

        async fn find_ssp_config(&self, _publisher_id: i64) -> Result<Option<SspConfig>> {
            Ok(None)
        }

        async fn top_fallback(&self, _zone_id: i64) -> Result<Option<FallbackAd>> {
            Ok(None)
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn campaign(id: i64, status: CampaignStatus) -> Campaign {
        Campaign {
            id,
            status,
            budget: None,
            spent: 0.0,
            end_date: None,
        }
    }

    fn vast(id: i64, status: CampaignStatus) -> VastCandidate {
        VastCandidate {
            source: VastSource {
                id,
                campaign_id: id + 100,
                vast_url: format!("https://ads.example/{id}.xml"),
                provider_name: "test".to_string(),
            },
            campaign: campaign(id + 100, status),
        }
    }

    fn external(id: i64) -> ExternalCandidate {
        ExternalCandidate {
            source: ExternalSource {
                id,
                campaign_id: id + 100,
                endpoint_url: format!("https://partner.example/{id}"),
                endpoint_type: "vast".to_string(),
                api_key: "key".to_string(),
            },
            campaign: campaign(id + 100, CampaignStatus::Active),
        }
    }

    fn pool(store: Arc<ListStore>, max_candidates: u64) -> CampaignPool {
        let vast_cache: VastCandidateCache = Arc::new(MokaObjectCache::new(
            "vast-candidates-test",
            10,
            Duration::from_secs(600),
        ));
        let external_cache: ExternalCandidateCache = Arc::new(MokaObjectCache::new(
            "external-candidates-test",
            10,
            Duration::from_secs(600),
        ));
        CampaignPool::new(store, vast_cache, external_cache, max_candidates)
    }

    #[tokio::test]
    async fn test_vast_list_is_cached() {
        let store = Arc::new(ListStore::default());
        store.vast.lock().unwrap().extend([
            vast(1, CampaignStatus::Active),
            vast(2, CampaignStatus::Active),
            vast(3, CampaignStatus::Active),
        ]);
        let pool = pool(store.clone(), 2);

        assert_eq!(pool.vast_candidates().await.unwrap().len(), 2);
        assert_eq!(pool.vast_candidates().await.unwrap().len(), 2);
        assert!(pool.pick_vast().await.unwrap().is_some());
        assert_eq!(store.vast_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_not_cached() {
        let store = Arc::new(ListStore::default());
        let pool = pool(store.clone(), 20);

        assert!(pool.external_candidates().await.unwrap().is_empty());
        assert!(pool.pick_external().await.unwrap().is_none());
        assert_eq!(store.external_reads.load(Ordering::SeqCst), 2);

        store.external.lock().unwrap().push(external(5));
        let picked = pool.pick_external().await.unwrap();
        assert_eq!(picked.map(|c| c.source.id), Some(5));
        assert!(pool.pick_external().await.unwrap().is_some());
        assert_eq!(store.external_reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pick_skips_ineligible_cached_entries() {
        let store = Arc::new(ListStore::default());
        store.vast.lock().unwrap().extend([
            vast(1, CampaignStatus::Paused),
            vast(2, CampaignStatus::Active),
        ]);
        let pool = pool(store.clone(), 20);

        for _ in 0..20 {
            let picked = pool.pick_vast().await.unwrap();
            assert_eq!(picked.map(|c| c.source.id), Some(2));
        }
        assert_eq!(store.vast_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pick_uniform_empty() {
        let empty: Vec<i32> = vec![];
        assert_eq!(pick_uniform(&empty), None);
    }

    #[test]
    fn test_pick_uniform_covers_all() {
        let items = vec![1, 2, 3];
        let mut seen = [false; 3];
        for _ in 0..500 {
            let picked = pick_uniform(&items).unwrap();
            seen[(picked - 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
