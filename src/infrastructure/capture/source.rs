//! Video Source Capability
//!
//! The RTSP decoder is an external collaborator. The capture loop drives it
//! through these blocking traits; tests inject scripted sources.

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture error types. All of them are transient from the capture loop's
/// point of view and feed the reconnect state machine.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to open stream: {0}")]
    Connect(String),

    #[error("Failed to read frame: {0}")]
    Read(String),

    #[error("Decoder returned a degenerate frame")]
    CorruptFrame,
}

/// Parameters for opening a stream.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub url: String,
    /// Decoder-side frame buffer hint. Small values keep latency low;
    /// the slot model drops frames anyway.
    pub buffer_size: usize,
}

/// A raw decoded frame as handed over by the decoder.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// BGR pixel data, row-major, one byte per channel.
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Returns true if dimensions and buffer length are consistent.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() >= self.width as usize * self.height as usize * 3
    }
}

/// An open video stream. Reads block until the next frame is decoded.
///
/// Driven only from the dedicated capture thread, so `Sync` is not
/// required.
pub trait VideoSource: Send {
    /// Blocks until the next frame arrives or the stream fails.
    fn read(&mut self) -> CaptureResult<RawFrame>;
}

/// Opens video streams. Each successful call hands back a fresh decoder
/// handle; the capture loop drops the handle on any read error and opens a
/// new one after backoff.
pub trait VideoSourceFactory: Send + Sync {
    /// Opens the stream described by the spec.
    fn open(&self, spec: &StreamSpec) -> CaptureResult<Box<dyn VideoSource>>;
}

/// Factory for a synthetic moving test pattern.
///
/// Stands in for the RTSP decoder collaborator so the pipeline can run
/// end to end without a camera.
#[derive(Debug, Clone)]
pub struct TestPatternFactory {
    width: u32,
    height: u32,
    frame_interval: std::time::Duration,
}

impl TestPatternFactory {
    /// Creates a factory producing frames of the given size at roughly
    /// the given rate.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: std::time::Duration::from_millis(1000 / fps.max(1) as u64),
        }
    }
}

impl VideoSourceFactory for TestPatternFactory {
    fn open(&self, _spec: &StreamSpec) -> CaptureResult<Box<dyn VideoSource>> {
        Ok(Box::new(TestPatternSource {
            width: self.width,
            height: self.height,
            frame_interval: self.frame_interval,
            tick: 0,
        }))
    }
}

struct TestPatternSource {
    width: u32,
    height: u32,
    frame_interval: std::time::Duration,
    tick: u64,
}

impl VideoSource for TestPatternSource {
    fn read(&mut self) -> CaptureResult<RawFrame> {
        std::thread::sleep(self.frame_interval);
        self.tick += 1;

        // Gray field with a vertical band sweeping left to right.
        let band = ((self.tick * 4) % self.width as u64) as u32;
        let mut data = Vec::with_capacity((self.width * self.height) as usize * 3);
        for _y in 0..self.height {
            for x in 0..self.width {
                let value = if x.abs_diff(band) < 16 { 220 } else { 96 };
                data.extend_from_slice(&[value, value, value]);
            }
        }

        Ok(RawFrame {
            width: self.width,
            height: self.height,
            data,
        })
    }
}
