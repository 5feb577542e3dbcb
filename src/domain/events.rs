//! Wire Events
//!
//! The records the pipeline emits downstream. Consumers contract on these
//! field names and types, so they are serialized through serde rather than
//! ad-hoc maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::DecisionOutcome;
use crate::domain::value_objects::BoundingBox;

/// A face identification event, appended to the durable log on MATCH and
/// broadcast to real-time subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEvent {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub frame_number: u64,
    pub person_id: String,
    pub full_name: String,
    pub similarity: f32,
    pub vote_percentage: f32,
    pub decision: DecisionOutcome,
    pub bbox: [i32; 4],
}

impl FaceEvent {
    /// Builds a face event from decision data.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera_id: impl Into<String>,
        frame_number: u64,
        person_id: impl Into<String>,
        full_name: impl Into<String>,
        similarity: f32,
        vote_percentage: f32,
        decision: DecisionOutcome,
        bbox: &BoundingBox,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            timestamp: Utc::now(),
            frame_number,
            person_id: person_id.into(),
            full_name: full_name.into(),
            similarity,
            vote_percentage,
            decision,
            bbox: bbox.to_array(),
        }
    }
}

/// Per-frame person count, appended to the durable log for every processed
/// frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonCountEvent {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub frame_number: u64,
}

impl PersonCountEvent {
    /// Builds a person count event.
    pub fn new(camera_id: impl Into<String>, frame_number: u64, count: usize) -> Self {
        Self {
            camera_id: camera_id.into(),
            timestamp: Utc::now(),
            count,
            frame_number,
        }
    }
}

/// Severity of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

/// An operator alert, broadcast fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub level: AlertLevel,
    pub message: String,
    pub service: String,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl Alert {
    /// Builds an alert with empty metadata.
    pub fn new(
        level: AlertLevel,
        message: impl Into<String>,
        service: impl Into<String>,
        camera_id: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            service: service.into(),
            camera_id: camera_id.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Attaches structured metadata to the alert.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
