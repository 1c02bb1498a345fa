//! Order dispatch for direct and shared delivery
//!
//! A mission addressed to a named worker goes to that worker's direct
//! stream; an unaddressed mission goes to the shared stream, where workers
//! compete for it through the `workers` consumer group. Both routes carry
//! the same [`OrderMessage`].

use crate::broker::{direct_stream, Broker, ORDERS_SHARED_STREAM};
use crate::error::RouterResult;
use crate::messages::OrderMessage;
use serde_json::Value;
use sortie_core::unix_now_secs;
use std::sync::Arc;
use tracing::info;

/// Where an order was published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Only the named worker will consume it
    Direct {
        /// Target worker identifier
        worker_id: String,
    },
    /// Next free worker in the shared group takes it
    Shared,
}

impl Route {
    /// Route for an optional target; blank targets are shared
    pub fn for_target(target: Option<&str>) -> Self {
        match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(worker_id) => Route::Direct {
                worker_id: worker_id.to_string(),
            },
            None => Route::Shared,
        }
    }

    /// Stream name backing this route
    pub fn stream(&self) -> String {
        match self {
            Route::Direct { worker_id } => direct_stream(worker_id),
            Route::Shared => ORDERS_SHARED_STREAM.to_string(),
        }
    }
}

/// Publishes orders onto the broker
#[derive(Clone)]
pub struct DispatchRouter {
    broker: Arc<dyn Broker>,
}

impl DispatchRouter {
    /// Create a router over `broker`
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Publish the order for `mission_id`.
    ///
    /// The mission must already be persisted; this only publishes.
    pub async fn dispatch(
        &self,
        mission_id: &str,
        payload: &Value,
        target: Option<&str>,
    ) -> RouterResult<Route> {
        let route = Route::for_target(target);
        let order = OrderMessage {
            mission_id: mission_id.to_string(),
            payload: payload.clone(),
            ts: unix_now_secs(),
        };
        let body = serde_json::to_string(&order)?;

        let stream = route.stream();
        let entry_id = self.broker.publish(&stream, &body).await?;

        info!(
            mission_id = %mission_id,
            stream = %stream,
            entry_id = %entry_id,
            "Order dispatched"
        );
        Ok(route)
    }

    /// Broker handle, for health probes
    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }
}
