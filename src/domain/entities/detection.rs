//! Detection Entity
//!
//! A single detector hit (person or face) in a frame.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::BoundingBox;

/// What kind of object a detection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Person,
    Face,
}

/// A detection result from one of the detector capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    bounding_box: BoundingBox,
    confidence: f32,
    class: DetectionClass,
}

impl Detection {
    /// Creates a new detection result.
    pub fn new(bounding_box: BoundingBox, confidence: f32, class: DetectionClass) -> Self {
        Self {
            bounding_box,
            confidence,
            class,
        }
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class(&self) -> DetectionClass {
        self.class
    }

    pub fn is_person(&self) -> bool {
        self.class == DetectionClass::Person
    }

    pub fn is_face(&self) -> bool {
        self.class == DetectionClass::Face
    }

    /// Checks whether a face detection is large enough for recognition.
    ///
    /// Small faces produce unreliable embeddings and are counted but never
    /// recognized.
    pub fn is_valid_face_size(&self, min_size: i32) -> bool {
        self.bounding_box.width() >= min_size && self.bounding_box.height() >= min_size
    }
}
