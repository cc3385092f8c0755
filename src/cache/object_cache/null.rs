use std::hash::Hash;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::trace;

use crate::cache::{CacheResult, ObjectCache};

/// 缓存关闭时使用：永远未命中，每次查询都落到存储
pub struct NullObjectCache<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> NullObjectCache<K, V> {
    pub fn new() -> Self {
        trace!("Using NullObjectCache: every lookup goes to storage");
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for NullObjectCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> ObjectCache<K, V> for NullObjectCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, _key: &K) -> CacheResult<V> {
        CacheResult::Miss
    }

    async fn insert(&self, _key: K, _value: V) {}

    async fn remove(&self, _key: &K) {}

    async fn invalidate_all(&self) {
        trace!("NullObjectCache.invalidate_all called, but no action taken");
    }
}
