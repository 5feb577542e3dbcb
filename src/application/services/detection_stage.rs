//! Detection Stage
//!
//! Wraps the detector capabilities behind one filtered interface: person
//! detections gated by confidence, face detections gated by confidence and
//! minimum size, plus margin-expanded face cropping.

use std::sync::Arc;

use image::ImageBuffer;
use tracing::{debug, warn};

use crate::domain::entities::{Detection, Frame};
use crate::infrastructure::inference::{FaceCrop, FaceDetector, PersonDetector};

/// Detection stage configuration.
#[derive(Debug, Clone)]
pub struct DetectionStageConfig {
    pub person_conf_threshold: f32,
    pub face_conf_threshold: f32,
    pub min_face_size: i32,
    /// Fraction of face width/height added on each side before cropping.
    pub crop_margin: f32,
}

impl Default for DetectionStageConfig {
    fn default() -> Self {
        Self {
            person_conf_threshold: 0.6,
            face_conf_threshold: 0.5,
            min_face_size: 80,
            crop_margin: 0.2,
        }
    }
}

/// Filtered access to the person and face detectors.
pub struct DetectionStage {
    person_detector: Arc<dyn PersonDetector>,
    face_detector: Arc<dyn FaceDetector>,
    config: DetectionStageConfig,
}

impl DetectionStage {
    /// Creates a new detection stage.
    pub fn new(
        person_detector: Arc<dyn PersonDetector>,
        face_detector: Arc<dyn FaceDetector>,
        config: DetectionStageConfig,
    ) -> Self {
        Self {
            person_detector,
            face_detector,
            config,
        }
    }

    /// Detects persons, keeping detections above the confidence threshold.
    ///
    /// A detector failure yields an empty list; a bad frame never stops
    /// the loop.
    pub async fn detect_persons(&self, frame: &Frame) -> Vec<Detection> {
        let detections = match self.person_detector.detect(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Person detection failed on frame {}: {}", frame.sequence(), e);
                return Vec::new();
            }
        };

        detections
            .into_iter()
            .filter(|d| d.is_person() && d.confidence() >= self.config.person_conf_threshold)
            .filter_map(|d| self.clipped(frame, d))
            .collect()
    }

    /// Detects faces, keeping detections above the confidence threshold
    /// and the minimum recognizable size.
    pub async fn detect_faces(&self, frame: &Frame) -> Vec<Detection> {
        let detections = match self.face_detector.detect(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Face detection failed on frame {}: {}", frame.sequence(), e);
                return Vec::new();
            }
        };

        detections
            .into_iter()
            .filter(|d| d.is_face() && d.confidence() >= self.config.face_conf_threshold)
            .filter_map(|d| self.clipped(frame, d))
            .filter(|d| {
                if d.is_valid_face_size(self.config.min_face_size) {
                    true
                } else {
                    debug!(
                        "Discarding {}x{} face below minimum size {}",
                        d.bounding_box().width(),
                        d.bounding_box().height(),
                        self.config.min_face_size
                    );
                    false
                }
            })
            .collect()
    }

    /// Crops a face region out of the frame with the configured margin.
    ///
    /// Returns `None` if clipping the expanded box to the frame leaves
    /// nothing to crop.
    pub fn crop_face(&self, frame: &Frame, detection: &Detection) -> Option<FaceCrop> {
        let expanded = detection.bounding_box().expand(self.config.crop_margin);
        let region = expanded.clip(frame.width(), frame.height())?;

        // The buffer is BGR; `Rgb` is used purely as a 3-channel layout,
        // so the channel order passes through the crop unchanged.
        let buffer: ImageBuffer<image::Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(frame.width(), frame.height(), frame.data().to_vec())?;

        let cropped = image::imageops::crop_imm(
            &buffer,
            region.x1() as u32,
            region.y1() as u32,
            region.width() as u32,
            region.height() as u32,
        )
        .to_image();

        Some(FaceCrop::new(
            region.width() as u32,
            region.height() as u32,
            cropped.into_raw(),
            detection.bounding_box().clone(),
        ))
    }

    /// Clips a detection box into the frame, dropping boxes that end up
    /// empty.
    fn clipped(&self, frame: &Frame, detection: Detection) -> Option<Detection> {
        detection
            .bounding_box()
            .clip(frame.width(), frame.height())
            .map(|bbox| Detection::new(bbox, detection.confidence(), detection.class()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DetectionClass;
    use crate::domain::value_objects::BoundingBox;
    use crate::infrastructure::inference::{MockFaceDetector, MockPersonDetector};

    fn frame(width: u32, height: u32) -> Frame {
        // Row-major gradient so crops are distinguishable.
        let mut data = Vec::with_capacity((width * height) as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 0]);
            }
        }
        Frame::new(1, width, height, data)
    }

    fn stage(persons: Vec<Detection>, faces: Vec<Detection>) -> DetectionStage {
        DetectionStage::new(
            Arc::new(MockPersonDetector::fixed(persons)),
            Arc::new(MockFaceDetector::fixed(faces)),
            DetectionStageConfig::default(),
        )
    }

    fn face(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Detection {
        Detection::new(
            BoundingBox::from_corners(x1, y1, x2, y2),
            confidence,
            DetectionClass::Face,
        )
    }

    #[tokio::test]
    async fn low_confidence_persons_are_filtered() {
        let persons = vec![
            Detection::new(
                BoundingBox::from_corners(0, 0, 50, 150),
                0.9,
                DetectionClass::Person,
            ),
            Detection::new(
                BoundingBox::from_corners(60, 0, 110, 150),
                0.3,
                DetectionClass::Person,
            ),
        ];
        let stage = stage(persons, Vec::new());
        let kept = stage.detect_persons(&frame(640, 480)).await;
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn face_at_exact_minimum_size_is_kept() {
        let stage = stage(Vec::new(), vec![face(0, 0, 80, 80, 0.9)]);
        let kept = stage.detect_faces(&frame(640, 480)).await;
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn face_one_pixel_under_minimum_is_discarded() {
        let stage = stage(Vec::new(), vec![face(0, 0, 79, 80, 0.9)]);
        let kept = stage.detect_faces(&frame(640, 480)).await;
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn low_confidence_faces_are_filtered() {
        let stage = stage(Vec::new(), vec![face(0, 0, 100, 100, 0.4)]);
        let kept = stage.detect_faces(&frame(640, 480)).await;
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn out_of_bounds_boxes_are_clipped_into_the_frame() {
        let stage = stage(Vec::new(), vec![face(-20, -20, 100, 100, 0.9)]);
        let kept = stage.detect_faces(&frame(640, 480)).await;
        assert_eq!(kept[0].bounding_box().to_array(), [0, 0, 100, 100]);
    }

    #[test]
    fn crop_expands_by_margin_and_clips() {
        let stage = stage(Vec::new(), Vec::new());
        let detection = face(100, 100, 200, 200, 0.9);
        let crop = stage.crop_face(&frame(640, 480), &detection).unwrap();

        // 100px box with a 20% margin becomes 140px on each axis.
        assert_eq!(crop.width(), 140);
        assert_eq!(crop.height(), 140);
        assert_eq!(crop.data().len(), 140 * 140 * 3);
    }

    #[test]
    fn crop_near_frame_edge_is_clipped_not_dropped() {
        let stage = stage(Vec::new(), Vec::new());
        let detection = face(0, 0, 100, 100, 0.9);
        let crop = stage.crop_face(&frame(640, 480), &detection).unwrap();

        // Margin extends past the origin and gets clipped there.
        assert_eq!(crop.width(), 120);
        assert_eq!(crop.height(), 120);
    }

    #[test]
    fn crop_preserves_pixel_values() {
        let stage = stage(Vec::new(), Vec::new());
        let detection = face(100, 100, 200, 200, 0.9);
        let source = frame(640, 480);
        let crop = stage.crop_face(&source, &detection).unwrap();

        // Top-left pixel of the crop is frame pixel (80, 80) after the
        // margin expansion.
        assert_eq!(crop.data()[0], 80);
        assert_eq!(crop.data()[1], 80);
    }

    #[test]
    fn fully_outside_crop_is_skipped() {
        let stage = stage(Vec::new(), Vec::new());
        let detection = face(700, 500, 800, 600, 0.9);
        assert!(stage.crop_face(&frame(640, 480), &detection).is_none());
    }

    mod detector_failures {
        use super::*;
        use crate::infrastructure::inference::{InferenceError, InferenceResult};
        use async_trait::async_trait;
        use mockall::mock;

        mock! {
            Detector {}

            #[async_trait]
            impl PersonDetector for Detector {
                async fn detect(&self, frame: &Frame) -> InferenceResult<Vec<Detection>>;
            }
        }

        #[tokio::test]
        async fn detector_failure_yields_empty_not_panic() {
            let mut detector = MockDetector::new();
            detector
                .expect_detect()
                .returning(|_| Err(InferenceError::Backend("model crashed".to_string())));

            let stage = DetectionStage::new(
                Arc::new(detector),
                Arc::new(MockFaceDetector::fixed(Vec::new())),
                DetectionStageConfig::default(),
            );

            let kept = stage.detect_persons(&frame(640, 480)).await;
            assert!(kept.is_empty());
        }
    }
}
