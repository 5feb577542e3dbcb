//! Event Publisher
//!
//! Dual-path emission: identification and person-count events go to the
//! durable log, real-time notifications and alerts go out over broadcast.
//! When the primary log rejects a face event, the event lands in a smaller
//! buffer log that an operator drains back after recovery.

mod redis;
mod transport;

pub use redis::RedisTransport;
pub use transport::{EventTransport, MemoryTransport, TransportError, TransportResult};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::domain::events::{Alert, FaceEvent, PersonCountEvent};

/// Event publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub face_events_stream: String,
    pub person_count_stream: String,
    pub buffer_stream: String,
    pub alerts_channel: String,
    pub face_detection_channel: String,
    pub primary_log_max_len: usize,
    pub max_buffer_size: usize,
    /// Upper bound on any single transport operation, so a downstream
    /// outage cannot stall the processing loop.
    pub publish_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            face_events_stream: "stream:face_events".to_string(),
            person_count_stream: "stream:person_count".to_string(),
            buffer_stream: "buffer:face_events".to_string(),
            alerts_channel: "alerts".to_string(),
            face_detection_channel: "face_detected".to_string(),
            primary_log_max_len: 100_000,
            max_buffer_size: 10_000,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of the publisher state.
#[derive(Debug, Clone, Serialize)]
pub struct PublisherStatus {
    pub reachable: bool,
    pub buffer_len: usize,
}

/// Publishes pipeline events over an injected transport.
///
/// All writes go through one bounded-timeout path and are awaited in call
/// order by the single processing task, so the durable log preserves
/// emission order.
pub struct EventPublisher {
    transport: Arc<dyn EventTransport>,
    config: PublisherConfig,
}

impl EventPublisher {
    /// Creates a publisher over the given transport.
    pub fn new(transport: Arc<dyn EventTransport>, config: PublisherConfig) -> Self {
        Self { transport, config }
    }

    /// Appends a face event to the durable log.
    ///
    /// A rejected primary write is retried once against the buffer log;
    /// only a double failure surfaces as an error.
    pub async fn emit_face_event(&self, event: &FaceEvent) -> TransportResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        match self
            .bounded(self.transport.append(
                &self.config.face_events_stream,
                &payload,
                self.config.primary_log_max_len,
            ))
            .await
        {
            Ok(id) => {
                debug!("Face event {} appended as {}", event.person_id, id);
                Ok(())
            }
            Err(e) => {
                warn!("Primary log rejected face event, buffering: {}", e);
                self.bounded(self.transport.append(
                    &self.config.buffer_stream,
                    &payload,
                    self.config.max_buffer_size,
                ))
                .await
                .map(|id| debug!("Face event buffered as {}", id))
            }
        }
    }

    /// Appends a person-count event to the durable log. Count events are
    /// per-frame and superseded immediately, so failures are dropped after
    /// logging rather than buffered.
    pub async fn emit_person_count(&self, event: &PersonCountEvent) -> TransportResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        self.bounded(self.transport.append(
            &self.config.person_count_stream,
            &payload,
            self.config.primary_log_max_len,
        ))
        .await
        .map(|_| ())
    }

    /// Broadcasts an operator alert. Best effort.
    pub async fn emit_alert(&self, alert: &Alert) {
        let Ok(payload) = serde_json::to_string(alert) else {
            error!("Alert serialization failed");
            return;
        };

        if let Err(e) = self
            .bounded(self.transport.publish(&self.config.alerts_channel, &payload))
            .await
        {
            warn!("Alert broadcast failed: {}", e);
        }
    }

    /// Broadcasts a real-time face notification. Best effort.
    pub async fn broadcast_face(&self, event: &FaceEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            error!("Face event serialization failed");
            return;
        };

        if let Err(e) = self
            .bounded(
                self.transport
                    .publish(&self.config.face_detection_channel, &payload),
            )
            .await
        {
            warn!("Face broadcast failed: {}", e);
        }
    }

    /// Drains the buffer log into the primary log.
    ///
    /// Entries are copied in original order and deleted from the buffer
    /// only after the primary accepts them; a failure mid-drain leaves the
    /// remainder buffered. Returns the number of entries drained.
    pub async fn drain_buffer(&self) -> TransportResult<usize> {
        let entries = self
            .bounded(self.transport.read_all(&self.config.buffer_stream))
            .await?;

        let mut drained = 0;
        for (entry_id, payload) in entries {
            match self
                .bounded(self.transport.append(
                    &self.config.face_events_stream,
                    &payload,
                    self.config.primary_log_max_len,
                ))
                .await
            {
                Ok(_) => {
                    self.bounded(self.transport.delete(&self.config.buffer_stream, &entry_id))
                        .await?;
                    drained += 1;
                }
                Err(e) => {
                    warn!("Drain stopped after {} entries: {}", drained, e);
                    break;
                }
            }
        }

        if drained > 0 {
            debug!("Drained {} buffered events into the primary log", drained);
        }
        Ok(drained)
    }

    /// Number of events waiting in the buffer log. Zero when the transport
    /// is unreachable.
    pub async fn buffer_len(&self) -> usize {
        self.bounded(self.transport.len(&self.config.buffer_stream))
            .await
            .unwrap_or(0)
    }

    /// Checks the transport connection.
    pub async fn is_reachable(&self) -> bool {
        self.bounded(self.transport.ping()).await.is_ok()
    }

    /// Returns a snapshot of the publisher state.
    pub async fn status(&self) -> PublisherStatus {
        PublisherStatus {
            reachable: self.is_reachable().await,
            buffer_len: self.buffer_len().await,
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl std::future::Future<Output = TransportResult<T>>,
    ) -> TransportResult<T> {
        tokio::time::timeout(self.config.publish_timeout, operation)
            .await
            .map_err(|_| TransportError::Timeout(self.config.publish_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DecisionOutcome;
    use crate::domain::events::AlertLevel;
    use crate::domain::value_objects::BoundingBox;

    fn face_event(person_id: &str) -> FaceEvent {
        FaceEvent::new(
            "camera_01",
            30,
            person_id,
            "Jane Doe",
            0.76,
            0.8,
            DecisionOutcome::Match,
            &BoundingBox::from_corners(10, 20, 130, 140),
        )
    }

    fn publisher() -> (Arc<MemoryTransport>, EventPublisher) {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = EventPublisher::new(transport.clone(), PublisherConfig::default());
        (transport, publisher)
    }

    #[tokio::test]
    async fn face_event_lands_in_primary_log() {
        let (transport, publisher) = publisher();
        publisher.emit_face_event(&face_event("EMP001")).await.unwrap();

        let entries = transport.read_all("stream:face_events").await.unwrap();
        assert_eq!(entries.len(), 1);

        let json: serde_json::Value = serde_json::from_str(&entries[0].1).unwrap();
        assert_eq!(json["person_id"], "EMP001");
        assert_eq!(json["decision"], "MATCH");
    }

    #[tokio::test]
    async fn rejected_primary_write_falls_back_to_buffer() {
        let (transport, publisher) = publisher();
        transport.fail_stream("stream:face_events");

        publisher.emit_face_event(&face_event("EMP001")).await.unwrap();

        assert_eq!(transport.len("stream:face_events").await.unwrap(), 0);
        assert_eq!(publisher.buffer_len().await, 1);
    }

    #[tokio::test]
    async fn drain_copies_in_order_and_empties_buffer() {
        let (transport, publisher) = publisher();
        transport.fail_stream("stream:face_events");

        for i in 0..5 {
            publisher
                .emit_face_event(&face_event(&format!("EMP{i:03}")))
                .await
                .unwrap();
        }
        transport.restore_stream("stream:face_events");

        let drained = publisher.drain_buffer().await.unwrap();
        assert_eq!(drained, 5);
        assert_eq!(publisher.buffer_len().await, 0);

        let entries = transport.read_all("stream:face_events").await.unwrap();
        let ids: Vec<String> = entries
            .iter()
            .map(|(_, p)| {
                let json: serde_json::Value = serde_json::from_str(p).unwrap();
                json["person_id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(ids, vec!["EMP000", "EMP001", "EMP002", "EMP003", "EMP004"]);
    }

    #[tokio::test]
    async fn drain_stops_when_primary_fails_again() {
        let (transport, publisher) = publisher();
        transport.fail_stream("stream:face_events");
        publisher.emit_face_event(&face_event("EMP001")).await.unwrap();

        // Primary still down: nothing drains, the buffer keeps the event.
        let drained = publisher.drain_buffer().await.unwrap();
        assert_eq!(drained, 0);
        assert_eq!(publisher.buffer_len().await, 1);
    }

    #[tokio::test]
    async fn person_count_failure_is_dropped_not_buffered() {
        let (transport, publisher) = publisher();
        transport.fail_stream("stream:person_count");

        let result = publisher
            .emit_person_count(&PersonCountEvent::new("camera_01", 1, 2))
            .await;
        assert!(result.is_err());
        assert_eq!(publisher.buffer_len().await, 0);
    }

    #[tokio::test]
    async fn alerts_broadcast_on_alerts_channel() {
        let (transport, publisher) = publisher();
        publisher
            .emit_alert(&Alert::new(
                AlertLevel::Warning,
                "camera offline",
                "facewatch",
                "camera_01",
            ))
            .await;

        let broadcasts = transport.broadcasts_on("alerts");
        assert_eq!(broadcasts.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&broadcasts[0]).unwrap();
        assert_eq!(json["type"], "warning");
    }

    #[tokio::test]
    async fn face_broadcast_uses_detection_channel() {
        let (transport, publisher) = publisher();
        publisher.broadcast_face(&face_event("EMP001")).await;
        assert_eq!(transport.broadcasts_on("face_detected").len(), 1);
    }

    #[tokio::test]
    async fn status_reflects_reachability_and_buffer() {
        let (transport, publisher) = publisher();
        transport.fail_stream("stream:face_events");
        publisher.emit_face_event(&face_event("EMP001")).await.unwrap();

        let status = publisher.status().await;
        assert!(status.reachable);
        assert_eq!(status.buffer_len, 1);
    }
}
