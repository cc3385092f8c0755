//! 事件管理器
//!
//! 计数器聚合只归 worker 所有，所有修改都经过同一个队列，
//! 因此并发请求不会重复或丢失增量，也不需要刷盘锁。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::config::EventsConfig;
use crate::errors::{AdServerError, Result};
use crate::events::{CounterSink, EventLog};
use crate::storage::models::{CounterField, CounterUpdate, ImpressionEvent, RtbBid};

#[derive(Debug, Clone, Copy)]
pub struct EventSettings {
    /// 不同 (zone, field) 的数量达到该值时立即刷盘
    pub flush_threshold: usize,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
}

impl From<&EventsConfig> for EventSettings {
    fn from(config: &EventsConfig) -> Self {
        Self {
            flush_threshold: config.flush_threshold.max(1),
            flush_interval: Duration::from_secs(config.flush_interval_secs.max(1)),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self::from(&EventsConfig::default())
    }
}

enum Command {
    Event(Box<ImpressionEvent>),
    Bid(Box<RtbBid>),
    Flush(oneshot::Sender<()>),
    Pending(oneshot::Sender<usize>),
}

/// 事件管理器句柄
///
/// `Clone` 很便宜，所有克隆共享同一个队列。
#[derive(Clone)]
pub struct EventManager {
    tx: mpsc::Sender<Command>,
}

impl EventManager {
    /// 启动后台 worker
    ///
    /// 所有句柄被 drop 后 worker 会做最后一次刷盘然后退出。
    pub fn start(
        counter_sink: Arc<dyn CounterSink>,
        event_log: Arc<dyn EventLog>,
        settings: EventSettings,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        let worker = Worker {
            rx,
            counter_sink,
            event_log,
            settings,
            aggregate: HashMap::new(),
            backoff: false,
        };
        let handle = tokio::spawn(worker.run());
        (Self { tx }, handle)
    }

    /// 记录事件（不阻塞，队列满时丢弃）
    ///
    /// impression / click 事件同时累加对应 zone 计数器。
    pub fn record(&self, event: ImpressionEvent) {
        self.enqueue(Command::Event(Box::new(event)));
    }

    /// 记录竞价结果（不阻塞，队列满时丢弃）
    pub fn record_bid(&self, bid: RtbBid) {
        self.enqueue(Command::Bid(Box::new(bid)));
    }

    fn enqueue(&self, command: Command) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("EventManager: queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("EventManager: worker stopped, event dropped");
            }
        }
    }

    /// 手动触发刷盘，等待之前入队的事件全部处理完
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(tx))
            .await
            .map_err(|_| AdServerError::event_queue("event worker is not running"))?;
        rx.await
            .map_err(|_| AdServerError::event_queue("event worker dropped flush request"))
    }

    /// 当前聚合中尚未刷盘的 (zone, field) 数量
    pub async fn pending(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Pending(tx))
            .await
            .map_err(|_| AdServerError::event_queue("event worker is not running"))?;
        rx.await
            .map_err(|_| AdServerError::event_queue("event worker dropped pending request"))
    }
}

struct Worker {
    rx: mpsc::Receiver<Command>,
    counter_sink: Arc<dyn CounterSink>,
    event_log: Arc<dyn EventLog>,
    settings: EventSettings,
    aggregate: HashMap<(i64, CounterField), u64>,
    /// 上次刷盘失败；阈值不再触发，等下一次定时刷盘
    backoff: bool,
}

impl Worker {
    async fn run(mut self) {
        let period = self.settings.flush_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    trace!("EventManager: scheduled flush");
                    self.flush_counters().await;
                }
            }
        }

        // 所有发送端已关闭
        self.flush_counters().await;
        debug!("EventManager: worker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Event(event) => {
                if let Some(field) = event.event_type.counter_field() {
                    self.increment(event.zone_id, field).await;
                }
                let zone_id = event.zone_id;
                if let Err(e) = self.event_log.log_event(*event).await {
                    warn!("EventManager: failed to log event for zone {}: {}", zone_id, e);
                }
            }
            Command::Bid(bid) => {
                let zone_id = bid.zone_id;
                if let Err(e) = self.event_log.log_bid(*bid).await {
                    warn!("EventManager: failed to log bid for zone {}: {}", zone_id, e);
                }
            }
            Command::Flush(done) => {
                self.flush_counters().await;
                let _ = done.send(());
            }
            Command::Pending(reply) => {
                let _ = reply.send(self.aggregate.len());
            }
        }
    }

    async fn increment(&mut self, zone_id: i64, field: CounterField) {
        *self.aggregate.entry((zone_id, field)).or_insert(0) += 1;
        trace!(
            "EventManager: zone {} {} pending, {} keys buffered",
            zone_id,
            field,
            self.aggregate.len()
        );

        if !self.backoff && self.aggregate.len() >= self.settings.flush_threshold {
            debug!("EventManager: flush threshold reached");
            self.flush_counters().await;
        }
    }

    async fn flush_counters(&mut self) {
        if self.aggregate.is_empty() {
            trace!("EventManager: no counters to flush");
            return;
        }

        let mut updates: Vec<CounterUpdate> = self
            .aggregate
            .drain()
            .map(|((zone_id, field), delta)| CounterUpdate {
                zone_id,
                field,
                delta,
            })
            .collect();
        updates.sort_by_key(|u| (u.zone_id, u.field == CounterField::Clicks));

        let count = updates.len();
        match self.counter_sink.flush_counters(updates.clone()).await {
            Ok(()) => {
                self.backoff = false;
                debug!("EventManager: flushed {} counter updates", count);
            }
            Err(e) => {
                self.backoff = true;
                // 刷盘失败，恢复到聚合中，下次一并写入
                for update in updates {
                    *self
                        .aggregate
                        .entry((update.zone_id, update.field))
                        .or_insert(0) += update.delta;
                }
                warn!(
                    "EventManager: flush_counters failed: {}, {} entries restored",
                    e, count
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{BidOrigin, BidStatus, EventSource, EventType};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockCounterSink {
        calls: AtomicUsize,
        flushed: Mutex<Vec<CounterUpdate>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl CounterSink for MockCounterSink {
        async fn flush_counters(&self, updates: Vec<CounterUpdate>) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("database unavailable");
            }
            self.flushed.lock().unwrap().extend(updates);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockEventLog {
        events: Mutex<Vec<ImpressionEvent>>,
        bids: Mutex<Vec<RtbBid>>,
    }

    #[async_trait]
    impl EventLog for MockEventLog {
        async fn log_event(&self, event: ImpressionEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }

        async fn log_bid(&self, bid: RtbBid) -> anyhow::Result<()> {
            self.bids.lock().unwrap().push(bid);
            Ok(())
        }
    }

    fn event(zone_id: i64, event_type: EventType) -> ImpressionEvent {
        ImpressionEvent {
            zone_id,
            campaign_id: None,
            impression_id: format!("imp_{}", zone_id),
            event_type,
            source: Some(EventSource::Tracking),
            user_ip: None,
            user_agent: None,
            referer: None,
            video_player_id: None,
            timestamp: Utc::now(),
        }
    }

    fn settings(threshold: usize) -> EventSettings {
        EventSettings {
            flush_threshold: threshold,
            flush_interval: Duration::from_secs(3600),
            queue_capacity: 1024,
        }
    }

    fn start(
        threshold: usize,
    ) -> (EventManager, Arc<MockCounterSink>, Arc<MockEventLog>) {
        let sink = Arc::new(MockCounterSink::default());
        let log = Arc::new(MockEventLog::default());
        let (manager, _handle) = EventManager::start(
            Arc::clone(&sink) as Arc<dyn CounterSink>,
            Arc::clone(&log) as Arc<dyn EventLog>,
            settings(threshold),
        );
        (manager, sink, log)
    }

    #[tokio::test]
    async fn test_same_zone_aggregates_into_one_update() {
        let (manager, sink, log) = start(50);

        for _ in 0..3 {
            manager.record(event(7, EventType::Impression));
        }
        manager.record(event(7, EventType::Click));
        assert_eq!(manager.pending().await.unwrap(), 2);

        manager.flush().await.unwrap();
        let flushed = sink.flushed.lock().unwrap().clone();
        assert_eq!(
            flushed,
            vec![
                CounterUpdate {
                    zone_id: 7,
                    field: CounterField::Impressions,
                    delta: 3
                },
                CounterUpdate {
                    zone_id: 7,
                    field: CounterField::Clicks,
                    delta: 1
                },
            ]
        );
        assert_eq!(log.events.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_threshold_flushes_exactly_once() {
        let (manager, sink, _log) = start(50);

        for zone in 1..50 {
            manager.record(event(zone, EventType::Impression));
        }
        assert_eq!(manager.pending().await.unwrap(), 49);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);

        manager.record(event(50, EventType::Impression));
        assert_eq!(manager.pending().await.unwrap(), 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.flushed.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_non_counter_events_do_not_touch_aggregate() {
        let (manager, sink, log) = start(50);

        manager.record(event(3, EventType::Error));
        manager.record(event(3, EventType::parse("midpoint")));
        manager.flush().await.unwrap();

        assert_eq!(manager.pending().await.unwrap(), 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(log.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_restores_updates() {
        let (manager, sink, _log) = start(50);
        sink.fail.store(true, Ordering::SeqCst);

        manager.record(event(1, EventType::Impression));
        manager.record(event(1, EventType::Impression));
        manager.flush().await.unwrap();
        assert_eq!(manager.pending().await.unwrap(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        manager.record(event(1, EventType::Impression));
        manager.flush().await.unwrap();

        let flushed = sink.flushed.lock().unwrap().clone();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].delta, 3);
    }

    #[tokio::test]
    async fn test_failed_flush_backs_off_threshold() {
        let (manager, sink, log) = start(2);
        sink.fail.store(true, Ordering::SeqCst);

        manager.record(event(1, EventType::Impression));
        manager.record(event(2, EventType::Impression));
        assert_eq!(manager.pending().await.unwrap(), 2);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        // 超过阈值也不再重试，原始事件照常写入
        manager.record(event(3, EventType::Impression));
        manager.record(event(4, EventType::Click));
        assert_eq!(manager.pending().await.unwrap(), 4);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.events.lock().unwrap().len(), 4);

        sink.fail.store(false, Ordering::SeqCst);
        manager.flush().await.unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.flushed.lock().unwrap().len(), 4);

        manager.record(event(5, EventType::Impression));
        manager.record(event(6, EventType::Impression));
        assert_eq!(manager.pending().await.unwrap(), 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bids_are_logged() {
        let (manager, _sink, log) = start(50);
        manager.record_bid(RtbBid {
            zone_id: 9,
            origin: BidOrigin::None,
            bid_price: 0.0,
            currency: "USD".to_string(),
            response_time_ms: 12,
            status: BidStatus::NoBid,
            vast_url: None,
            timestamp: Utc::now(),
        });
        manager.flush().await.unwrap();
        assert_eq!(log.bids.lock().unwrap()[0].status, BidStatus::NoBid);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let (manager, sink, _log) = start(100_000);

        let mut handles = vec![];
        for _ in 0..10 {
            let mgr = manager.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    mgr.record(event(1, EventType::Impression));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        manager.flush().await.unwrap();
        let total: u64 = sink.flushed.lock().unwrap().iter().map(|u| u.delta).sum();
        assert_eq!(total, 500);
    }

    #[tokio::test]
    async fn test_worker_flushes_when_handles_dropped() {
        let sink = Arc::new(MockCounterSink::default());
        let log = Arc::new(MockEventLog::default());
        let (manager, handle) = EventManager::start(
            Arc::clone(&sink) as Arc<dyn CounterSink>,
            Arc::clone(&log) as Arc<dyn EventLog>,
            settings(50),
        );

        manager.record(event(4, EventType::Click));
        drop(manager);
        handle.await.unwrap();

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }
}
