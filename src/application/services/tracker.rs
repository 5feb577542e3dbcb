//! Face Tracker
//!
//! Track assignment is an interface contract: the verifier only needs ids
//! that stay stable across its window for the same physical person.
//! Deployments with a real multi-object tracker inject it here; the
//! default greedily matches face boxes frame-to-frame by IoU.

use uuid::Uuid;

use crate::domain::value_objects::BoundingBox;

/// Assigns stable track ids to face boxes across frames.
pub trait FaceTracker: Send + Sync {
    /// Returns one track id per box, aligned with the input order.
    fn assign(&mut self, frame_seq: u64, boxes: &[BoundingBox]) -> Vec<String>;
}

struct Track {
    id: String,
    last_box: BoundingBox,
    last_seen_seq: u64,
}

/// Greedy IoU tracker.
///
/// Each box claims the unclaimed existing track it overlaps best, above a
/// minimum IoU; everything else mints a fresh track. Tracks idle longer
/// than `max_gap_frames` are dropped.
pub struct IouTracker {
    min_iou: f32,
    max_gap_frames: u64,
    tracks: Vec<Track>,
}

impl IouTracker {
    /// Creates a tracker with the given association threshold and idle
    /// track lifetime (in frames).
    pub fn new(min_iou: f32, max_gap_frames: u64) -> Self {
        Self {
            min_iou,
            max_gap_frames,
            tracks: Vec::new(),
        }
    }
}

fn mint_id() -> String {
    format!("track-{}", Uuid::new_v4())
}

impl FaceTracker for IouTracker {
    fn assign(&mut self, frame_seq: u64, boxes: &[BoundingBox]) -> Vec<String> {
        self.tracks
            .retain(|t| frame_seq.saturating_sub(t.last_seen_seq) <= self.max_gap_frames);

        let mut claimed = vec![false; self.tracks.len()];
        let mut assignments = Vec::with_capacity(boxes.len());

        for bbox in boxes {
            let mut best: Option<(usize, f32)> = None;
            for (index, track) in self.tracks.iter().enumerate() {
                if claimed[index] {
                    continue;
                }
                let iou = bbox.iou(&track.last_box);
                if iou < self.min_iou {
                    continue;
                }
                if best.map(|(_, best_iou)| iou > best_iou).unwrap_or(true) {
                    best = Some((index, iou));
                }
            }

            match best {
                Some((index, _)) => {
                    claimed[index] = true;
                    let track = &mut self.tracks[index];
                    track.last_box = bbox.clone();
                    track.last_seen_seq = frame_seq;
                    assignments.push(track.id.clone());
                }
                None => {
                    let id = mint_id();
                    self.tracks.push(Track {
                        id: id.clone(),
                        last_box: bbox.clone(),
                        last_seen_seq: frame_seq,
                    });
                    claimed.push(true);
                    assignments.push(id);
                }
            }
        }

        assignments
    }
}
