//! Inference Capabilities
//!
//! The CNN engines for person detection, face detection, and embedding
//! extraction live outside the core. The pipeline consumes them through
//! these traits with constructor injection, so tests can supply
//! deterministic fakes and deployments can plug in any backend.

mod mock;

pub use mock::{MockEmbedder, MockFaceDetector, MockPersonDetector};

use async_trait::async_trait;

use crate::domain::entities::{Detection, Frame};
use crate::domain::value_objects::BoundingBox;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Inference error types.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model returned unusable output: {0}")]
    BadOutput(String),

    #[error("Inference backend failed: {0}")]
    Backend(String),
}

/// A face region cropped out of a frame, handed to the embedder.
///
/// Pixel layout matches [`Frame`]: BGR, one byte per channel, row-major.
#[derive(Debug, Clone)]
pub struct FaceCrop {
    width: u32,
    height: u32,
    data: Vec<u8>,
    source_box: BoundingBox,
}

impl FaceCrop {
    /// Creates a face crop.
    pub fn new(width: u32, height: u32, data: Vec<u8>, source_box: BoundingBox) -> Self {
        Self {
            width,
            height,
            data,
            source_box,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The face bounding box in the source frame (before margin expansion).
    pub fn source_box(&self) -> &BoundingBox {
        &self.source_box
    }
}

/// The dominant face found inside a crop by the embedding model.
///
/// Age and pose estimates are optional: backends that do not predict them
/// leave them unset and the quality score falls back to detector confidence
/// alone.
#[derive(Debug, Clone)]
pub struct FaceDescriptor {
    pub embedding: Vec<f32>,
    pub confidence: f32,
    pub age: Option<f32>,
    /// Head pose as `[pitch, yaw, roll]` in degrees.
    pub pose: Option<[f32; 3]>,
}

/// Detects people in full frames.
#[async_trait]
pub trait PersonDetector: Send + Sync {
    /// Runs person detection over a frame.
    async fn detect(&self, frame: &Frame) -> InferenceResult<Vec<Detection>>;
}

/// Detects faces in full frames.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Runs face detection over a frame.
    async fn detect(&self, frame: &Frame) -> InferenceResult<Vec<Detection>>;
}

/// Extracts an identity embedding from a cropped face.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Re-detects the face inside the crop and returns the dominant face
    /// descriptor, or `None` if no face is found in the crop.
    async fn embed(&self, crop: &FaceCrop) -> InferenceResult<Option<FaceDescriptor>>;
}
