//! Status ingestor: drains the `status` stream into the mission registry.
//!
//! Per delivery:
//! 1. Decode the [`StatusEvent`] (drop + warn on failure)
//! 2. Validate `(token, soldier_id)` (drop + warn on failure, never requeued)
//! 3. Apply the transition; store failures retry with a fixed delay
//! 4. Acknowledge, whatever the outcome
//!
//! On start the ingestor first replays entries its consumer name received
//! but never acknowledged, so a crash between read and ack loses nothing.

use sortie_c2_router::{Broker, Delivery, RouterResult, StatusEvent, COMMANDER_GROUP, STATUS_STREAM};
use sortie_domain::{DomainError, MissionRegistry, TransitionOutcome};
use sortie_identity::TokenAuthority;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default wait before retrying after a broker or store failure
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default blocking-read window
pub const DEFAULT_BLOCK: Duration = Duration::from_secs(5);

const READ_BATCH: usize = 16;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Transition attempted against the registry
    Processed(TransitionOutcome),
    /// Body did not decode as a status event
    Malformed,
    /// Token did not validate for the reporting worker
    Unauthorized,
    /// Mission record could not be decoded
    Dropped,
}

/// Single logical consumer of the status stream.
pub struct StatusIngestor {
    broker: Arc<dyn Broker>,
    registry: MissionRegistry,
    authority: TokenAuthority,
    consumer: String,
    block: Duration,
    retry_delay: Duration,
}

impl StatusIngestor {
    pub fn new(
        broker: Arc<dyn Broker>,
        registry: MissionRegistry,
        authority: TokenAuthority,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            registry,
            authority,
            consumer: consumer.into(),
            block: DEFAULT_BLOCK,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the read window and retry delay.
    pub fn with_timing(mut self, block: Duration, retry_delay: Duration) -> Self {
        self.block = block;
        self.retry_delay = retry_delay;
        self
    }

    /// Handle one delivery without acknowledging it.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> IngestOutcome {
        let event: StatusEvent = match serde_json::from_str(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(entry_id = %delivery.id, error = %e, "Dropping malformed status event");
                return IngestOutcome::Malformed;
            }
        };

        if !self.authority.validate(&event.token, &event.soldier_id).await {
            warn!(
                mission_id = %event.mission_id,
                soldier_id = %event.soldier_id,
                status = %event.status,
                "Dropping status event with invalid token"
            );
            return IngestOutcome::Unauthorized;
        }

        loop {
            match self
                .registry
                .apply_transition(&event.mission_id, event.status, event.ts)
                .await
            {
                Ok(outcome) => {
                    if let TransitionOutcome::Applied { from, to } = outcome {
                        info!(
                            mission_id = %event.mission_id,
                            soldier_id = %event.soldier_id,
                            from = %from,
                            to = %to,
                            detail = event.detail.as_deref().unwrap_or(""),
                            "Mission status updated"
                        );
                    }
                    return IngestOutcome::Processed(outcome);
                }
                Err(e @ (DomainError::Store(_) | DomainError::Contention { .. })) => {
                    error!(mission_id = %event.mission_id, error = %e, "Transition failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!(mission_id = %event.mission_id, error = %e, "Dropping status event");
                    return IngestOutcome::Dropped;
                }
            }
        }
    }

    /// Read one batch, handle and acknowledge every delivery.
    ///
    /// Returns how many deliveries were handled.
    pub async fn poll_once(&self) -> RouterResult<usize> {
        let streams = [STATUS_STREAM.to_string()];
        let deliveries = self
            .broker
            .read_group(&streams, COMMANDER_GROUP, &self.consumer, READ_BATCH, self.block)
            .await?;

        for delivery in &deliveries {
            let outcome = self.handle_delivery(delivery).await;
            debug!(entry_id = %delivery.id, outcome = ?outcome, "Status delivery handled");
            self.broker
                .ack(&delivery.stream, COMMANDER_GROUP, &delivery.id)
                .await?;
        }
        Ok(deliveries.len())
    }

    /// Handle and acknowledge every entry still pending for this consumer.
    ///
    /// Returns how many were replayed.
    pub async fn recover_pending(&self) -> RouterResult<usize> {
        let streams = [STATUS_STREAM.to_string()];
        let mut total = 0;
        loop {
            let deliveries = self
                .broker
                .read_pending(&streams, COMMANDER_GROUP, &self.consumer, READ_BATCH)
                .await?;
            if deliveries.is_empty() {
                return Ok(total);
            }
            for delivery in &deliveries {
                let outcome = self.handle_delivery(delivery).await;
                debug!(entry_id = %delivery.id, outcome = ?outcome, "Pending status delivery replayed");
                self.broker
                    .ack(&delivery.stream, COMMANDER_GROUP, &delivery.id)
                    .await?;
            }
            total += deliveries.len();
        }
    }

    /// Create the consumer group, retrying until the broker answers.
    pub async fn ensure_group(&self) {
        while let Err(e) = self.broker.ensure_group(STATUS_STREAM, COMMANDER_GROUP).await {
            error!(error = %e, "Failed to create status consumer group, retrying");
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Consume forever.
    pub async fn run(self) {
        self.ensure_group().await;
        loop {
            match self.recover_pending().await {
                Ok(0) => break,
                Ok(n) => {
                    info!(consumer = %self.consumer, count = n, "Replayed unacknowledged status events");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Pending status replay failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
        info!(consumer = %self.consumer, stream = STATUS_STREAM, "Status ingestor started");

        loop {
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Status stream read failed, backing off");
                tokio::time::sleep(self.retry_delay).await;
                // The group disappears if the stream was deleted
                self.ensure_group().await;
            }
        }
    }
}
