//! Mock Inference Backend
//!
//! Deterministic detector/embedder implementations for tests, local
//! development, and demo deployments without GPU inference.

use async_trait::async_trait;

use crate::domain::entities::{Detection, DetectionClass, Frame};
use crate::domain::value_objects::BoundingBox;

use super::{Embedder, FaceCrop, FaceDescriptor, FaceDetector, InferenceResult, PersonDetector};

/// Person detector that replays a scripted set of detections every frame.
///
/// The `synthetic` constructor instead derives one walking person from the
/// frame sequence, giving demo deployments moving output.
#[derive(Debug, Clone, Default)]
pub struct MockPersonDetector {
    fixed: Vec<Detection>,
    synthetic: bool,
}

impl MockPersonDetector {
    /// Returns the given detections for every frame.
    pub fn fixed(detections: Vec<Detection>) -> Self {
        Self {
            fixed: detections,
            synthetic: false,
        }
    }

    /// Derives a deterministic moving person from the frame sequence.
    pub fn synthetic() -> Self {
        Self {
            fixed: Vec::new(),
            synthetic: true,
        }
    }
}

#[async_trait]
impl PersonDetector for MockPersonDetector {
    async fn detect(&self, frame: &Frame) -> InferenceResult<Vec<Detection>> {
        if !self.synthetic {
            return Ok(self.fixed.clone());
        }

        let x = (frame.sequence() * 7 % frame.width().max(200) as u64 / 2) as i32;
        let bbox = BoundingBox::from_corners(x, 40, x + 120, 400);
        Ok(vec![Detection::new(bbox, 0.85, DetectionClass::Person)])
    }
}

/// Face detector that replays a scripted set of detections every frame.
#[derive(Debug, Clone, Default)]
pub struct MockFaceDetector {
    fixed: Vec<Detection>,
    synthetic: bool,
}

impl MockFaceDetector {
    /// Returns the given detections for every frame.
    pub fn fixed(detections: Vec<Detection>) -> Self {
        Self {
            fixed: detections,
            synthetic: false,
        }
    }

    /// Derives one deterministic face from the frame sequence.
    pub fn synthetic() -> Self {
        Self {
            fixed: Vec::new(),
            synthetic: true,
        }
    }
}

#[async_trait]
impl FaceDetector for MockFaceDetector {
    async fn detect(&self, frame: &Frame) -> InferenceResult<Vec<Detection>> {
        if !self.synthetic {
            return Ok(self.fixed.clone());
        }

        let x = (frame.sequence() * 7 % frame.width().max(200) as u64 / 2) as i32;
        let bbox = BoundingBox::from_corners(x + 10, 60, x + 110, 160);
        Ok(vec![Detection::new(bbox, 0.75, DetectionClass::Face)])
    }
}

/// Embedder that returns a scripted descriptor for every crop.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    descriptor: Option<FaceDescriptor>,
}

impl MockEmbedder {
    /// Returns the given descriptor for every crop.
    pub fn returning(descriptor: FaceDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
        }
    }

    /// Finds no face in any crop.
    pub fn empty() -> Self {
        Self { descriptor: None }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _crop: &FaceCrop) -> InferenceResult<Option<FaceDescriptor>> {
        Ok(self.descriptor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame::new(sequence, 640, 480, vec![0u8; 640 * 480 * 3])
    }

    #[tokio::test]
    async fn fixed_detector_replays_script() {
        let bbox = BoundingBox::from_corners(0, 0, 120, 120);
        let detector =
            MockFaceDetector::fixed(vec![Detection::new(bbox, 0.9, DetectionClass::Face)]);

        let first = detector.detect(&frame(1)).await.unwrap();
        let second = detector.detect(&frame(2)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn synthetic_detector_is_deterministic() {
        let detector = MockPersonDetector::synthetic();
        let a = detector.detect(&frame(42)).await.unwrap();
        let b = detector.detect(&frame(42)).await.unwrap();
        assert_eq!(a[0].bounding_box(), b[0].bounding_box());
    }

    #[tokio::test]
    async fn empty_embedder_finds_no_face() {
        let embedder = MockEmbedder::empty();
        let crop = FaceCrop::new(10, 10, vec![0; 300], BoundingBox::from_corners(0, 0, 10, 10));
        assert!(embedder.embed(&crop).await.unwrap().is_none());
    }
}
