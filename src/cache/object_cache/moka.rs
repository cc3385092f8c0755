use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::cache::{CacheResult, ObjectCache};

pub struct MokaObjectCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
}

impl<K, V> MokaObjectCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &str, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .name(name)
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        debug!(
            "MokaObjectCache '{}' initialized with max capacity: {}, TTL: {}s",
            name,
            max_capacity,
            ttl.as_secs()
        );
        Self { inner }
    }
}

#[async_trait]
impl<K, V> ObjectCache<K, V> for MokaObjectCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> CacheResult<V> {
        match self.inner.get(key).await {
            Some(value) => CacheResult::Found(value),
            None => CacheResult::Miss,
        }
    }

    async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    async fn remove(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
