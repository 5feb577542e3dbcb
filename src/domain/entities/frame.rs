//! Frame Entity
//!
//! A decoded video frame as published by the capture loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Number of channels per pixel (BGR).
pub const FRAME_CHANNELS: usize = 3;

/// A decoded video frame.
///
/// The pixel buffer is BGR, one byte per channel, and reference-counted:
/// cloning a frame is a shallow copy, so the latest-frame slot can hand the
/// same frame to the processing path without copying megapixels. The buffer
/// is never mutated after capture.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    width: u32,
    height: u32,
    data: Arc<Vec<u8>>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            width,
            height,
            data: Arc::new(data),
            captured_at: Utc::now(),
        }
    }

    /// Creates a frame with an explicit capture timestamp.
    pub fn with_timestamp(
        sequence: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sequence,
            width,
            height,
            data: Arc::new(data),
            captured_at,
        }
    }

    /// Monotonic sequence number assigned by the capture loop.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGR pixel data, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Expected buffer length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * FRAME_CHANNELS
    }

    /// Returns true if the frame has usable dimensions and a full buffer.
    pub fn is_decodable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= self.expected_len()
    }
}
