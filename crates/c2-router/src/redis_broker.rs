//! Redis Streams [`Broker`].
//!
//! XADD publishes, XREADGROUP with `>` hands out new entries and with `0`
//! replays the consumer's own unacknowledged ones, XACK removes them from
//! the pending list. Group creation tolerates `BUSYGROUP`.

use crate::broker::{Broker, Delivery, BODY_FIELD};
use crate::error::RouterResult;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisResult};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Broker over a Redis server.
#[derive(Clone)]
pub struct RedisStreamBroker {
    conn: MultiplexedConnection,
}

impl RedisStreamBroker {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> RouterResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!(url = %url, "Connected to Redis broker");
        Ok(Self { conn })
    }
}

impl RedisStreamBroker {
    async fn xreadgroup(
        &self,
        streams: &[String],
        start: &str,
        opts: &StreamReadOptions,
    ) -> RouterResult<Vec<Delivery>> {
        let ids = vec![start; streams.len()];

        // Nil when BLOCK expires with nothing new
        let reply: Option<StreamReadReply> = self
            .conn
            .clone()
            .xread_options(streams, &ids, opts)
            .await?;

        let mut out = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in key.ids {
                // Trimmed entries come back from the pending list without fields
                let body = entry.get::<String>(BODY_FIELD).unwrap_or_else(|| {
                    warn!(stream = %key.key, id = %entry.id, "Stream entry has no body field");
                    String::new()
                });
                out.push(Delivery {
                    stream: key.key.clone(),
                    id: entry.id,
                    body,
                });
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Broker for RedisStreamBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> RouterResult<()> {
        // XGROUP CREATE key group 0 MKSTREAM
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut self.conn.clone())
            .await;

        match result {
            Ok(()) => {
                info!(stream = %stream, group = %group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %stream, group = %group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn publish(&self, stream: &str, body: &str) -> RouterResult<String> {
        let id: String = self
            .conn
            .clone()
            .xadd(stream, "*", &[(BODY_FIELD, body)])
            .await?;
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
        let mut opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count.max(1));
        if !block.is_zero() {
            opts = opts.block(block.as_millis() as usize);
        }
        self.xreadgroup(streams, ">", &opts).await
    }

    async fn read_pending(
        &self,
        streams: &[String],
        group: &str,
        consumer: &str,
        count: usize,
    ) -> RouterResult<Vec<Delivery>> {
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count.max(1));
        self.xreadgroup(streams, "0", &opts).await
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> RouterResult<()> {
        let acked: i64 = self.conn.clone().xack(stream, group, &[id]).await?;
        if acked != 1 {
            warn!(stream = %stream, id = %id, "XACK returned {}, entry may not exist", acked);
        }
        Ok(())
    }

    async fn ping(&self) -> RouterResult<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await?;
        Ok(())
    }
}
