//! Key-value store abstraction backing the mission registry and token store.
//!
//! The store is the only shared mutable state in the commander. Callers rely
//! on per-key linearizability: `compare_and_swap` is the primitive used for
//! read-modify-write, and `set_all` writes several keys in one atomic step.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Linearizable per-key store operations.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;

    /// Write a value, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CoreResult<()>;

    /// Write several keys atomically (no expiry).
    async fn set_all(&self, entries: &[(String, String)]) -> CoreResult<()>;

    /// Replace `key` with `new` only if it currently holds `expected`.
    ///
    /// Returns `false` when the key is absent or holds a different value.
    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> CoreResult<bool>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>>;

    /// Remaining time to live; `None` when absent or persistent.
    async fn ttl(&self, key: &str) -> CoreResult<Option<Duration>>;

    /// Reachability probe.
    async fn ping(&self) -> CoreResult<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process store with the same semantics as the Redis backend.
///
/// Expiry follows the tokio clock, so paused-time tests can fast-forward
/// through TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (every call errors).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// True when no live keys remain
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_online(&self) -> CoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::Store("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CoreResult<()> {
        self.check_online()?;
        let expires_at = ttl.map(|t| Instant::now() + t);
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_all(&self, pairs: &[(String, String)]) -> CoreResult<()> {
        self.check_online()?;
        let mut entries = self.entries.lock().await;
        for (key, value) in pairs {
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> CoreResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) && entry.value == expected => {
                entry.value = new.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.check_online()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        self.check_online()?;
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn ping(&self) -> CoreResult<()> {
        self.check_online()
    }
}
