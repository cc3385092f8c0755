use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::{
    Campaign, ExternalCandidate, ExternalSource, FallbackAd, SspConfig, VastCandidate,
    VastSource, Zone,
};

/// 投放引擎对存储的只读视图
///
/// 广告配置由管理后台维护，这里只读取投放所需的最小集合。
#[async_trait]
pub trait AdStore: Send + Sync {
    async fn find_zone(&self, zone_id: i64) -> Result<Option<Zone>>;

    /// 有效活动的 VAST 源，最多 `limit` 条
    async fn list_vast_candidates(&self, limit: u64) -> Result<Vec<VastCandidate>>;

    /// 有效活动的外部合作方，最多 `limit` 条
    async fn list_external_candidates(&self, limit: u64) -> Result<Vec<ExternalCandidate>>;

    /// 发布商唯一的 active SSP 配置
    async fn find_ssp_config(&self, publisher_id: i64) -> Result<Option<SspConfig>>;

    /// zone 下优先级最高的 active 兜底广告
    async fn top_fallback(&self, zone_id: i64) -> Result<Option<FallbackAd>>;

    async fn ping(&self) -> Result<()>;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<SeaOrmStorage>> {
        // 从 URL 自动推断数据库类型
        let backend_type = backend::infer_backend_from_url(&config.database_url)?;

        let storage = backend::SeaOrmStorage::new(config, &backend_type).await?;
        Ok(Arc::new(storage))
    }
}
