//! In-process [`Broker`] with consumer-group semantics.
//!
//! Each stream keeps every entry; each group keeps a cursor into the
//! stream and a pending map of delivered-but-unacknowledged entries, keyed
//! by position and tagged with the consumer that received them. Blocking
//! reads park on a [`Notify`] that every publish wakes.

use crate::broker::{Broker, Delivery};
use crate::error::{RouterError, RouterResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Debug, Default)]
struct GroupState {
    next: usize,
    pending: BTreeMap<usize, String>,
}

#[derive(Debug, Default)]
struct StreamState {
    entries: Vec<(String, String)>,
    groups: HashMap<String, GroupState>,
}

/// Broker held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    streams: Mutex<HashMap<String, StreamState>>,
    notify: Notify,
    seq: AtomicU64,
    offline: AtomicBool,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker becoming unreachable (every call errors).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every body ever published to `stream`, in order.
    pub async fn published(&self, stream: &str) -> Vec<String> {
        self.streams
            .lock()
            .await
            .get(stream)
            .map(|s| s.entries.iter().map(|(_, body)| body.clone()).collect())
            .unwrap_or_default()
    }

    /// Delivered but unacknowledged entries for `group` on `stream`.
    pub async fn pending(&self, stream: &str, group: &str) -> usize {
        self.streams
            .lock()
            .await
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.pending.len())
    }

    fn check_online(&self) -> RouterResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RouterError::Broker("memory broker offline".to_string()));
        }
        Ok(())
    }

    fn take_ready(
        streams: &mut HashMap<String, StreamState>,
        names: &[String],
        group: &str,
        consumer: &str,
        count: usize,
    ) -> RouterResult<Vec<Delivery>> {
        let mut out = Vec::new();
        for name in names {
            let state = streams.get_mut(name).ok_or_else(|| RouterError::NoGroup {
                stream: name.clone(),
                group: group.to_string(),
            })?;
            let cursor = state.groups.get_mut(group).ok_or_else(|| RouterError::NoGroup {
                stream: name.clone(),
                group: group.to_string(),
            })?;

            while cursor.next < state.entries.len() && out.len() < count {
                let (id, body) = &state.entries[cursor.next];
                cursor.pending.insert(cursor.next, consumer.to_string());
                cursor.next += 1;
                out.push(Delivery {
                    stream: name.clone(),
                    id: id.clone(),
                    body: body.clone(),
                });
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> RouterResult<()> {
        self.check_online()?;
        self.streams
            .lock()
            .await
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, stream: &str, body: &str) -> RouterResult<String> {
        self.check_online()?;
        let id = format!("{}-0", self.seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.streams
            .lock()
            .await
            .entry(stream.to_string())
            .or_default()
            .entries
            .push((id.clone(), body.to_string()));
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn read_group(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> RouterResult<Vec<Delivery>> {
        let deadline = Instant::now() + block;
        loop {
            self.check_online()?;

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut guard = self.streams.lock().await;
                let ready = Self::take_ready(&mut guard, streams, group, consumer, count.max(1))?;
                if !ready.is_empty() {
                    return Ok(ready);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn read_pending(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        count: usize,
    ) -> RouterResult<Vec<Delivery>> {
        self.check_online()?;
        let guard = self.streams.lock().await;
        let count = count.max(1);
        let mut out = Vec::new();
        for name in streams {
            let no_group = || RouterError::NoGroup {
                stream: name.clone(),
                group: group.to_string(),
            };
            let state = guard.get(name).ok_or_else(no_group)?;
            let cursor = state.groups.get(group).ok_or_else(no_group)?;
            for (&pos, owner) in &cursor.pending {
                if out.len() >= count {
                    return Ok(out);
                }
                if owner == consumer {
                    let (id, body) = &state.entries[pos];
                    out.push(Delivery {
                        stream: name.clone(),
                        id: id.clone(),
                        body: body.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> RouterResult<()> {
        self.check_online()?;
        let mut guard = self.streams.lock().await;
        if let Some(state) = guard.get_mut(stream) {
            let pos = state.entries.iter().position(|(entry_id, _)| entry_id == id);
            if let (Some(pos), Some(g)) = (pos, state.groups.get_mut(group)) {
                g.pending.remove(&pos);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> RouterResult<()> {
        self.check_online()
    }
}
