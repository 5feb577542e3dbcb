//! Redis Event Transport
//!
//! Durable streams over Redis Streams (`XADD` with `MAXLEN`), broadcasts
//! over Pub/Sub. Each entry stores its JSON payload under a single `data`
//! field, which consumers replay through consumer groups.

use async_trait::async_trait;
use redis::streams::{StreamMaxlen, StreamRangeReply};
use redis::AsyncCommands;
use tracing::info;

use super::transport::{EventTransport, TransportError, TransportResult};

/// Stream entry field holding the serialized event.
const PAYLOAD_FIELD: &str = "data";

/// Event transport backed by Redis.
pub struct RedisTransport {
    client: redis::Client,
}

impl RedisTransport {
    /// Creates a transport for the given Redis URL. Connections are
    /// established lazily per operation through a multiplexed pool.
    pub fn new(redis_url: &str) -> TransportResult<Self> {
        let client = redis::Client::open(redis_url)?;
        info!("Redis transport configured for {}", redis_url);
        Ok(Self { client })
    }

    async fn connection(&self) -> TransportResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl EventTransport for RedisTransport {
    async fn append(
        &self,
        stream: &str,
        payload: &str,
        max_len: usize,
    ) -> TransportResult<String> {
        let mut conn = self.connection().await?;
        let id: String = conn
            .xadd_maxlen(
                stream,
                StreamMaxlen::Equals(max_len),
                "*",
                &[(PAYLOAD_FIELD, payload)],
            )
            .await?;
        Ok(id)
    }

    async fn publish(&self, channel: &str, payload: &str) -> TransportResult<()> {
        let mut conn = self.connection().await?;
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn read_all(&self, stream: &str) -> TransportResult<Vec<(String, String)>> {
        let mut conn = self.connection().await?;
        let reply: StreamRangeReply = conn.xrange_all(stream).await?;

        let mut entries = Vec::with_capacity(reply.ids.len());
        for entry in reply.ids {
            let payload: String = entry.get(PAYLOAD_FIELD).ok_or_else(|| {
                TransportError::Rejected(format!("entry {} has no payload field", entry.id))
            })?;
            entries.push((entry.id, payload));
        }
        Ok(entries)
    }

    async fn delete(&self, stream: &str, entry_id: &str) -> TransportResult<()> {
        let mut conn = self.connection().await?;
        conn.xdel::<_, _, ()>(stream, &[entry_id]).await?;
        Ok(())
    }

    async fn len(&self, stream: &str) -> TransportResult<usize> {
        let mut conn = self.connection().await?;
        let len: usize = conn.xlen(stream).await?;
        Ok(len)
    }

    async fn ping(&self) -> TransportResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
