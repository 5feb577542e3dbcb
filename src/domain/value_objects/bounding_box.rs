//! Bounding Box Value Object
//!
//! Represents a rectangular region of a frame in corner form.

use serde::{Deserialize, Serialize};

/// A bounding box defined by its top-left and bottom-right corners.
///
/// Invariant: `x1 < x2` and `y1 < y2`. Boxes handed to the pipeline are
/// clipped into the frame bounds before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl BoundingBox {
    /// Creates a bounding box from corner coordinates, normalizing order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Returns the area of the bounding box.
    pub fn area(&self) -> i32 {
        self.width() * self.height()
    }

    /// Expands the box by a fraction of its width/height on every side.
    ///
    /// The result is not clipped; call [`BoundingBox::clip`] afterwards.
    pub fn expand(&self, margin: f32) -> Self {
        let margin_w = (self.width() as f32 * margin) as i32;
        let margin_h = (self.height() as f32 * margin) as i32;
        Self {
            x1: self.x1 - margin_w,
            y1: self.y1 - margin_h,
            x2: self.x2 + margin_w,
            y2: self.y2 + margin_h,
        }
    }

    /// Clips the box into `[0, width) × [0, height)`.
    ///
    /// Returns `None` if the clipped region is empty.
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        let x1 = self.x1.max(0);
        let y1 = self.y1.max(0);
        let x2 = self.x2.min(width as i32);
        let y2 = self.y2.min(height as i32);

        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Checks if this bounding box intersects with another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x1 < other.x2 && self.x2 > other.x1 && self.y1 < other.y2 && self.y2 > other.y1
    }

    /// Calculates the intersection over union (IoU) with another bounding box.
    /// Used for tracking and matching detections.
    ///
    /// Reference: https://en.wikipedia.org/wiki/Jaccard_index
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union == 0 {
            return 0.0;
        }

        intersection as f32 / union as f32
    }

    /// Converts to a JSON-compatible array format `[x1, y1, x2, y2]`.
    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Creates from a JSON array `[x1, y1, x2, y2]`.
    pub fn from_array(arr: [i32; 4]) -> Self {
        Self::from_corners(arr[0], arr[1], arr[2], arr[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let bbox = BoundingBox::from_corners(100, 120, 10, 20);
        assert_eq!(bbox.x1(), 10);
        assert_eq!(bbox.y1(), 20);
        assert_eq!(bbox.x2(), 100);
        assert_eq!(bbox.y2(), 120);
    }

    #[test]
    fn width_height_and_area_are_derived() {
        let bbox = BoundingBox::from_corners(10, 20, 30, 60);
        assert_eq!(bbox.width(), 20);
        assert_eq!(bbox.height(), 40);
        assert_eq!(bbox.area(), 800);
    }

    #[test]
    fn expand_grows_every_side() {
        let bbox = BoundingBox::from_corners(100, 100, 200, 200);
        let expanded = bbox.expand(0.2);
        assert_eq!(expanded.to_array(), [80, 80, 220, 220]);
    }

    #[test]
    fn clip_clamps_to_frame_bounds() {
        let bbox = BoundingBox::from_corners(-10, -20, 150, 250);
        let clipped = bbox.clip(100, 200).unwrap();
        assert_eq!(clipped.to_array(), [0, 0, 100, 200]);
    }

    #[test]
    fn clip_of_fully_outside_box_is_none() {
        let bbox = BoundingBox::from_corners(200, 200, 300, 300);
        assert!(bbox.clip(100, 100).is_none());
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b1 = BoundingBox::from_corners(0, 0, 100, 100);
        let b2 = BoundingBox::from_corners(0, 0, 100, 100);
        assert!((b1.iou(&b2) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_non_overlapping_is_zero() {
        let b1 = BoundingBox::from_corners(0, 0, 100, 100);
        let b2 = BoundingBox::from_corners(200, 200, 300, 300);
        assert!((b1.iou(&b2) - 0.0).abs() < f32::EPSILON);
        assert!(!b1.intersects(&b2));
    }

    #[test]
    fn array_roundtrip_preserves_values() {
        let original = BoundingBox::from_corners(10, 20, 30, 40);
        let restored = BoundingBox::from_array(original.to_array());
        assert_eq!(original, restored);
    }
}
