//! Alert Sink
//!
//! Operator alerts originate in the capture thread (reconnect escalation)
//! and in the processing loop. The sink decouples producers from the
//! publisher: the capture thread pushes into a bounded channel that the
//! processing loop drains and broadcasts.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::domain::events::Alert;

/// Receives operator alerts. Implementations must not block.
pub trait AlertSink: Send + Sync {
    /// Delivers an alert. Best effort; may drop under pressure.
    fn emit(&self, alert: Alert);
}

/// Alert sink backed by a bounded channel.
///
/// The capture thread is the producer; the processing loop owns the
/// receiver and forwards drained alerts to the event publisher. A full
/// channel drops the alert rather than stalling capture.
#[derive(Clone)]
pub struct ChannelAlertSink {
    sender: Sender<Alert>,
}

impl ChannelAlertSink {
    /// Creates a sink and its receiving half.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Alert>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl AlertSink for ChannelAlertSink {
    fn emit(&self, alert: Alert) {
        if let Err(TrySendError::Full(alert)) = self.sender.try_send(alert) {
            warn!("Alert channel full, dropping {} alert", alert.level.as_str());
        }
    }
}

/// Alert sink that discards everything. For wiring paths that do not
/// escalate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn emit(&self, _alert: Alert) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::AlertLevel;

    #[test]
    fn emitted_alerts_arrive_on_receiver() {
        let (sink, receiver) = ChannelAlertSink::bounded(4);
        sink.emit(Alert::new(AlertLevel::Warning, "camera offline", "facewatch", "camera_01"));

        let alert = receiver.try_recv().unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.message, "camera offline");
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, receiver) = ChannelAlertSink::bounded(1);
        sink.emit(Alert::new(AlertLevel::Info, "first", "facewatch", "camera_01"));
        sink.emit(Alert::new(AlertLevel::Info, "second", "facewatch", "camera_01"));

        assert_eq!(receiver.try_recv().unwrap().message, "first");
        assert!(receiver.try_recv().is_err());
    }
}
