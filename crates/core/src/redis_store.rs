//! Redis-backed [`KvStore`].
//!
//! Uses one multiplexed async connection, cloned per call. Compare-and-swap
//! runs as a server-side Lua script so the read-compare-write is a single
//! atomic step on the key.

use crate::error::CoreResult;
use crate::store::KvStore;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;
use tracing::debug;

const CAS_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
    return 1
end
return 0
"#;

/// SCAN batch hint
const SCAN_COUNT: usize = 100;

/// Redis persistence store.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    cas: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> CoreResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!(url = %url, "Connected to Redis store");
        Ok(Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CoreResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        cmd.query_async::<_, ()>(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn set_all(&self, entries: &[(String, String)]) -> CoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET").arg(key).arg(value).ignore();
        }
        pipe.query_async::<_, ()>(&mut self.conn.clone()).await?;
        Ok(())
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> CoreResult<bool> {
        let swapped: i64 = self
            .cas
            .key(key)
            .arg(expected)
            .arg(new)
            .invoke_async(&mut self.conn.clone())
            .await?;
        Ok(swapped == 1)
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        // -2: missing, -1: no expiry
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn ping(&self) -> CoreResult<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await?;
        Ok(())
    }
}
