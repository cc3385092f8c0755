//! 读缓存
//!
//! zone 配置和候选广告列表在存储前面各放一层 `ObjectCache`，
//! `cache.enabled = false` 时换成永远未命中的空实现。

pub mod object_cache;
pub mod traits;

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use object_cache::{MokaObjectCache, NullObjectCache};
pub use traits::{CacheResult, ObjectCache};

/// 根据配置构建对象缓存
pub fn build_object_cache<K, V>(
    name: &str,
    config: &CacheConfig,
    ttl: Duration,
) -> Arc<dyn ObjectCache<K, V>>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if config.enabled {
        Arc::new(MokaObjectCache::new(name, config.max_capacity, ttl))
    } else {
        Arc::new(NullObjectCache::new())
    }
}
