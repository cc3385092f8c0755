use crate::storage::models::{CounterUpdate, ImpressionEvent, RtbBid};

/// zone 计数器 Sink（聚合模式）
///
/// 一次调用对应一次批量写入，`updates` 中每个 (zone, field) 最多出现一次。
#[async_trait::async_trait]
pub trait CounterSink: Send + Sync {
    async fn flush_counters(&self, updates: Vec<CounterUpdate>) -> anyhow::Result<()>;
}

/// 原始事件日志 Sink
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    /// 写入一条展示 / 点击 / 错误事件
    async fn log_event(&self, event: ImpressionEvent) -> anyhow::Result<()>;

    /// 写入一条竞价记录（无论是否胜出）
    async fn log_bid(&self, bid: RtbBid) -> anyhow::Result<()>;
}
