use std::hash::Hash;

use async_trait::async_trait;

/// 缓存查询结果
#[derive(Debug, Clone, PartialEq)]
pub enum CacheResult<V> {
    /// 命中
    Found(V),
    /// 未命中（或缓存已禁用）
    Miss,
}

/// 对象缓存
///
/// zone 配置与候选广告列表都是读多写少的数据，过期时间在构建时确定，
/// 调用方只关心命中 / 未命中。
#[async_trait]
pub trait ObjectCache<K, V>: Send + Sync
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> CacheResult<V>;
    async fn insert(&self, key: K, value: V);
    async fn remove(&self, key: &K);
    async fn invalidate_all(&self);
}
