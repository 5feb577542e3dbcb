//! Event Transport Capability
//!
//! The publisher writes through this trait: an append-only, length-capped
//! durable log plus a fire-and-forget broadcast channel. The Redis
//! implementation lives in [`super::redis`]; the in-memory implementation
//! here backs tests and transport-less deployments.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable log + broadcast transport.
///
/// Durable streams are append-only and capped: an append that pushes the
/// stream past `max_len` evicts the oldest entries. Entry ids are returned
/// on append and are unique per stream. Broadcasts are best-effort.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Appends a payload to a durable stream, trimming to `max_len` newest
    /// entries. Returns the entry id.
    async fn append(&self, stream: &str, payload: &str, max_len: usize)
        -> TransportResult<String>;

    /// Publishes a payload on a broadcast channel.
    async fn publish(&self, channel: &str, payload: &str) -> TransportResult<()>;

    /// Reads all entries of a stream in append order as `(id, payload)`.
    async fn read_all(&self, stream: &str) -> TransportResult<Vec<(String, String)>>;

    /// Deletes one entry from a stream.
    async fn delete(&self, stream: &str, entry_id: &str) -> TransportResult<()>;

    /// Number of entries currently in a stream.
    async fn len(&self, stream: &str) -> TransportResult<usize>;

    /// Checks the transport connection.
    async fn ping(&self) -> TransportResult<()>;
}

/// In-memory transport.
///
/// Streams are per-name deques; broadcasts are retained per channel so
/// tests can assert on them. The fault switches let tests and local runs
/// simulate a downstream outage on selected streams.
#[derive(Default)]
pub struct MemoryTransport {
    streams: Mutex<HashMap<String, VecDeque<(String, String)>>>,
    broadcasts: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
    next_id: AtomicU64,
}

impl MemoryTransport {
    /// Creates an empty in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes appends to the given stream fail until restored.
    pub fn fail_stream(&self, stream: &str) {
        self.failing.lock().unwrap().insert(stream.to_string());
    }

    /// Restores appends to the given stream.
    pub fn restore_stream(&self, stream: &str) {
        self.failing.lock().unwrap().remove(stream);
    }

    /// Broadcast payloads observed on a channel, in publish order.
    pub fn broadcasts_on(&self, channel: &str) -> Vec<String> {
        self.broadcasts
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn append(
        &self,
        stream: &str,
        payload: &str,
        max_len: usize,
    ) -> TransportResult<String> {
        if self.failing.lock().unwrap().contains(stream) {
            return Err(TransportError::Rejected(format!(
                "stream {stream} unavailable"
            )));
        }

        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut streams = self.streams.lock().unwrap();
        let entries = streams.entry(stream.to_string()).or_default();
        entries.push_back((id.clone(), payload.to_string()));
        while entries.len() > max_len {
            entries.pop_front();
        }
        Ok(id)
    }

    async fn publish(&self, channel: &str, payload: &str) -> TransportResult<()> {
        self.broadcasts
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(())
    }

    async fn read_all(&self, stream: &str) -> TransportResult<Vec<(String, String)>> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(stream)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, stream: &str, entry_id: &str) -> TransportResult<()> {
        if let Some(entries) = self.streams.lock().unwrap().get_mut(stream) {
            entries.retain(|(id, _)| id != entry_id);
        }
        Ok(())
    }

    async fn len(&self, stream: &str) -> TransportResult<usize> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .get(stream)
            .map(VecDeque::len)
            .unwrap_or(0))
    }

    async fn ping(&self) -> TransportResult<()> {
        Ok(())
    }
}
