//! Order consumption and bounded mission execution.
//!
//! One loop reads the worker's direct stream and the shared stream. Each
//! order needs a semaphore permit before it is read, so a busy worker
//! leaves shared orders for its peers. Orders are acknowledged on receipt;
//! execution then runs as a spawned task that owns the permit.

use crate::error::WorkerResult;
use crate::executor::MissionExecutor;
use crate::token::TokenManager;
use sortie_c2_router::{
    direct_stream, Broker, Delivery, OrderMessage, StatusEvent, ORDERS_SHARED_STREAM,
    STATUS_STREAM, WORKERS_GROUP,
};
use sortie_core::unix_now_secs;
use sortie_domain::MissionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// Default blocking-read window
pub const DEFAULT_BLOCK: Duration = Duration::from_secs(5);

/// Attempts per status publish before giving up on it
pub const STATUS_PUBLISH_ATTEMPTS: usize = 3;

/// Handles shared by the consumption loop and every execution task.
struct Shared {
    worker_id: String,
    broker: Arc<dyn Broker>,
    tokens: Arc<TokenManager>,
    executor: Arc<dyn MissionExecutor>,
    retry_delay: Duration,
}

/// A worker process: one consumption loop, at most N executions.
pub struct Worker {
    shared: Arc<Shared>,
    slots: Arc<Semaphore>,
    concurrency: usize,
    streams: Vec<String>,
    block: Duration,
}

impl Worker {
    pub fn new(
        broker: Arc<dyn Broker>,
        tokens: Arc<TokenManager>,
        executor: Arc<dyn MissionExecutor>,
        concurrency: usize,
        retry_delay: Duration,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let worker_id = tokens.worker_id().to_string();
        let streams = vec![direct_stream(&worker_id), ORDERS_SHARED_STREAM.to_string()];
        Self {
            shared: Arc::new(Shared {
                worker_id,
                broker,
                tokens,
                executor,
                retry_delay,
            }),
            slots: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            streams,
            block: DEFAULT_BLOCK,
        }
    }

    /// Override the blocking-read window.
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.shared.worker_id
    }

    /// Executions currently running
    pub fn in_flight(&self) -> usize {
        self.concurrency - self.slots.available_permits()
    }

    /// Create the consumer groups on both order streams, retrying until
    /// the broker answers.
    pub async fn prepare(&self) {
        for stream in &self.streams {
            while let Err(e) = self.shared.broker.ensure_group(stream, WORKERS_GROUP).await {
                error!(stream = %stream, error = %e, "Failed to create consumer group, retrying");
                tokio::time::sleep(self.shared.retry_delay).await;
            }
        }
    }

    /// Wait for a free slot, read at most one order and start executing it.
    ///
    /// Returns whether an order was started.
    pub async fn poll_once(&self) -> WorkerResult<bool> {
        let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
            return Ok(false);
        };

        let deliveries = self
            .shared
            .broker
            .read_group(&self.streams, WORKERS_GROUP, &self.shared.worker_id, 1, self.block)
            .await?;

        let Some(delivery) = deliveries.into_iter().next() else {
            return Ok(false);
        };

        self.shared
            .broker
            .ack(&delivery.stream, WORKERS_GROUP, &delivery.id)
            .await?;

        let Some(order) = decode_order(&delivery) else {
            return Ok(false);
        };

        info!(
            worker_id = %self.shared.worker_id,
            mission_id = %order.mission_id,
            stream = %delivery.stream,
            "Order received"
        );
        tokio::spawn(Arc::clone(&self.shared).execute(order, permit));
        Ok(true)
    }

    /// Consume forever.
    pub async fn run(self) {
        self.prepare().await;
        info!(
            worker_id = %self.shared.worker_id,
            concurrency = self.concurrency,
            "Worker listening for orders"
        );

        loop {
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Order stream read failed, backing off");
                tokio::time::sleep(self.shared.retry_delay).await;
                self.prepare().await;
            }
        }
    }
}

fn decode_order(delivery: &Delivery) -> Option<OrderMessage> {
    match serde_json::from_str::<OrderMessage>(&delivery.body) {
        Ok(order) if !order.mission_id.is_empty() => Some(order),
        Ok(_) => {
            warn!(entry_id = %delivery.id, "Dropping order without mission id");
            None
        }
        Err(e) => {
            warn!(entry_id = %delivery.id, error = %e, "Dropping malformed order");
            None
        }
    }
}

impl Shared {
    async fn execute(self: Arc<Self>, order: OrderMessage, _permit: OwnedSemaphorePermit) {
        let credential = self.tokens.current().await;
        self.emit(&order.mission_id, MissionStatus::InProgress, credential.token(), None)
            .await;

        let result = self.executor.execute(&order).await;
        info!(
            worker_id = %self.worker_id,
            mission_id = %order.mission_id,
            status = %result.status,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Mission finished"
        );

        let credential = self.tokens.for_terminal().await;
        let detail = format!("executed in {}s", result.elapsed.as_secs());
        self.emit(&order.mission_id, result.status, credential.token(), Some(detail))
            .await;
    }

    async fn emit(&self, mission_id: &str, status: MissionStatus, token: &str, detail: Option<String>) {
        let event = StatusEvent {
            mission_id: mission_id.to_string(),
            status,
            soldier_id: self.worker_id.clone(),
            token: token.to_string(),
            detail,
            ts: unix_now_secs(),
        };
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(e) => {
                error!(mission_id = %mission_id, error = %e, "Failed to encode status event");
                return;
            }
        };

        for attempt in 1..=STATUS_PUBLISH_ATTEMPTS {
            match self.publish_status(&body).await {
                Ok(()) => {
                    debug!(mission_id = %mission_id, status = %status, "Status emitted");
                    return;
                }
                Err(e) if attempt < STATUS_PUBLISH_ATTEMPTS => {
                    warn!(mission_id = %mission_id, attempt, error = %e, "Status publish failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(mission_id = %mission_id, status = %status, error = %e, "Status publish failed, giving up");
                }
            }
        }
    }

    async fn publish_status(&self, body: &str) -> WorkerResult<()> {
        self.broker.publish(STATUS_STREAM, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Execution;
    use crate::token::tests::CountingIssuer;
    use async_trait::async_trait;
    use serde_json::json;
    use sortie_c2_router::MemoryBroker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zeroize::Zeroizing;

    /// Runs for a fixed time and records peak concurrency.
    struct GaugeExecutor {
        running: AtomicUsize,
        peak: AtomicUsize,
        duration: Duration,
    }

    impl GaugeExecutor {
        fn new(duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                duration,
            })
        }
    }

    #[async_trait]
    impl MissionExecutor for GaugeExecutor {
        async fn execute(&self, _order: &OrderMessage) -> Execution {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Execution {
                status: MissionStatus::Completed,
                elapsed: self.duration,
            }
        }
    }

    async fn tokens(issuer: Arc<CountingIssuer>) -> Arc<TokenManager> {
        Arc::new(
            TokenManager::bootstrap(
                issuer,
                "w1",
                Zeroizing::new("s".to_string()),
                Duration::from_secs(3),
                Duration::from_secs(2),
            )
            .await,
        )
    }

    fn order(id: &str) -> String {
        serde_json::to_string(&OrderMessage {
            mission_id: id.to_string(),
            payload: json!({"task": "recon"}),
            ts: 0,
        })
        .unwrap()
    }

    async fn statuses(broker: &MemoryBroker) -> Vec<StatusEvent> {
        broker
            .published(STATUS_STREAM)
            .await
            .iter()
            .map(|b| serde_json::from_str(b).unwrap())
            .collect()
    }

    async fn wait_for_statuses(broker: &MemoryBroker, n: usize) -> Vec<StatusEvent> {
        for _ in 0..10_000 {
            let got = statuses(broker).await;
            if got.len() >= n {
                return got;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("timed out waiting for {n} status events");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_concurrency() {
        let broker = Arc::new(MemoryBroker::new());
        let executor = GaugeExecutor::new(Duration::from_secs(5));
        let worker = Worker::new(
            broker.clone(),
            tokens(CountingIssuer::new(3600)).await,
            executor.clone(),
            3,
            Duration::from_secs(1),
        )
        .with_block(Duration::from_millis(200));

        worker.prepare().await;
        for i in 0..10 {
            broker.publish(ORDERS_SHARED_STREAM, &order(&format!("m{i}"))).await.unwrap();
        }
        tokio::spawn(worker.run());

        let events = wait_for_statuses(&broker, 20).await;
        assert_eq!(executor.peak.load(Ordering::SeqCst), 3);
        assert_eq!(
            events.iter().filter(|e| e.status == MissionStatus::Completed).count(),
            10
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_worker_leaves_orders_unread() {
        let broker = Arc::new(MemoryBroker::new());
        let worker = Worker::new(
            broker.clone(),
            tokens(CountingIssuer::new(3600)).await,
            GaugeExecutor::new(Duration::from_secs(60)),
            1,
            Duration::from_secs(1),
        )
        .with_block(Duration::ZERO);
        worker.prepare().await;

        broker.publish(ORDERS_SHARED_STREAM, &order("a")).await.unwrap();
        broker.publish(ORDERS_SHARED_STREAM, &order("b")).await.unwrap();

        assert!(worker.poll_once().await.unwrap());
        tokio::task::yield_now().await;
        assert_eq!(worker.in_flight(), 1);

        // A peer in the same group can still take the second order
        let peer = broker
            .read_group(
                &[ORDERS_SHARED_STREAM.to_string()],
                WORKERS_GROUP,
                "peer",
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert_eq!(peer.len(), 1);
        assert!(peer[0].body.contains("\"b\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_in_progress_then_terminal() {
        let broker = Arc::new(MemoryBroker::new());
        let worker = Worker::new(
            broker.clone(),
            tokens(CountingIssuer::new(3600)).await,
            GaugeExecutor::new(Duration::from_secs(2)),
            1,
            Duration::from_secs(1),
        )
        .with_block(Duration::ZERO);
        worker.prepare().await;
        broker.publish(&direct_stream("w1"), &order("m1")).await.unwrap();

        assert!(worker.poll_once().await.unwrap());
        let events = wait_for_statuses(&broker, 2).await;

        assert_eq!(events[0].status, MissionStatus::InProgress);
        assert_eq!(events[1].status, MissionStatus::Completed);
        for e in &events {
            assert_eq!(e.mission_id, "m1");
            assert_eq!(e.soldier_id, "w1");
            assert_eq!(e.token, "tok-1");
        }
        assert!(events[1].detail.is_some());
        // Acknowledged on receipt
        assert_eq!(broker.pending(&direct_stream("w1"), WORKERS_GROUP).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_uses_rotated_token() {
        let broker = Arc::new(MemoryBroker::new());
        let tokens = tokens(CountingIssuer::new(30)).await;
        tokio::spawn(tokens.clone().run_refresher());

        let worker = Worker::new(
            broker.clone(),
            tokens,
            GaugeExecutor::new(Duration::from_secs(40)),
            1,
            Duration::from_secs(1),
        )
        .with_block(Duration::ZERO);
        worker.prepare().await;
        broker.publish(ORDERS_SHARED_STREAM, &order("m1")).await.unwrap();

        assert!(worker.poll_once().await.unwrap());
        let events = wait_for_statuses(&broker, 2).await;
        assert_eq!(events[0].token, "tok-1");
        assert_eq!(events[1].token, "tok-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_order_is_acked_and_dropped() {
        let broker = Arc::new(MemoryBroker::new());
        let worker = Worker::new(
            broker.clone(),
            tokens(CountingIssuer::new(3600)).await,
            GaugeExecutor::new(Duration::from_secs(1)),
            1,
            Duration::from_secs(1),
        )
        .with_block(Duration::ZERO);
        worker.prepare().await;
        broker.publish(ORDERS_SHARED_STREAM, "garbage").await.unwrap();
        broker
            .publish(ORDERS_SHARED_STREAM, &json!({"payload": 1}).to_string())
            .await
            .unwrap();

        assert!(!worker.poll_once().await.unwrap());
        assert!(!worker.poll_once().await.unwrap());
        assert_eq!(worker.in_flight(), 0);
        assert_eq!(broker.pending(ORDERS_SHARED_STREAM, WORKERS_GROUP).await, 0);
        assert!(broker.published(STATUS_STREAM).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_surfaces() {
        let broker = Arc::new(MemoryBroker::new());
        let worker = Worker::new(
            broker.clone(),
            tokens(CountingIssuer::new(3600)).await,
            GaugeExecutor::new(Duration::from_secs(1)),
            1,
            Duration::from_secs(1),
        );
        broker.set_offline(true);
        assert!(worker.poll_once().await.is_err());
        assert_eq!(worker.in_flight(), 0);
    }
}
