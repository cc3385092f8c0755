//! 事件记录
//!
//! 请求路径只把事件丢进有界队列，单个后台 worker 负责：
//! - 按顺序写入原始事件 / 竞价记录
//! - 聚合 zone 计数器，达到阈值、定时或关闭时批量刷盘

pub mod manager;
pub mod sink;

pub use manager::{EventManager, EventSettings};
pub use sink::{CounterSink, EventLog};
