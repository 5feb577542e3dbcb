//! Stream Capture
//!
//! Resilient capture loop for one RTSP camera. A dedicated thread performs
//! the blocking decoder reads and publishes each frame into a single-slot
//! latest-frame store; the processing path polls the slot and never blocks
//! on the network. Reconnection uses exponential backoff with operator
//! alert escalation.

mod backoff;
mod source;

pub use backoff::ReconnectBackoff;
pub use source::{
    CaptureError, CaptureResult, RawFrame, StreamSpec, TestPatternFactory, VideoSource,
    VideoSourceFactory,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::entities::Frame;
use crate::domain::events::{Alert, AlertLevel};
use crate::infrastructure::alerts::AlertSink;

/// Consecutive retries before a warning alert.
const WARNING_RETRY_THRESHOLD: u64 = 3;
/// Consecutive retries before a critical alert.
const CRITICAL_RETRY_THRESHOLD: u64 = 10;

/// Stream capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub camera_id: String,
    pub rtsp_url: String,
    pub service_name: String,
    pub frame_buffer_size: usize,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_id: "camera_01".to_string(),
            rtsp_url: String::new(),
            service_name: "facewatch".to_string(),
            frame_buffer_size: 2,
            initial_retry_delay: Duration::from_secs(30),
            max_retry_delay: Duration::from_secs(300),
        }
    }
}

/// Snapshot of the capture loop state.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub connected: bool,
    pub running: bool,
    pub frame_count: u64,
    pub error_count: u64,
    pub retry_count: u64,
    pub last_frame_time: Option<DateTime<Utc>>,
    pub connection_start_time: Option<DateTime<Utc>>,
    pub current_retry_delay_secs: f64,
}

#[derive(Default)]
struct Timing {
    last_frame_time: Option<DateTime<Utc>>,
    connection_start_time: Option<DateTime<Utc>>,
    current_retry_delay: Option<Duration>,
}

struct Shared {
    latest: Mutex<Option<Frame>>,
    running: AtomicBool,
    connected: AtomicBool,
    frame_count: AtomicU64,
    error_count: AtomicU64,
    retry_count: AtomicU64,
    timing: Mutex<Timing>,
}

impl Shared {
    fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            running: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            frame_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
            timing: Mutex::new(Timing::default()),
        }
    }
}

/// Resilient capture loop over one video stream.
///
/// The worker thread is the sole writer of the latest-frame slot; readers
/// receive shallow copies. Frame drops are preferred over queue buildup, so
/// the slot holds at most one frame.
pub struct StreamCapture {
    config: CaptureConfig,
    factory: Arc<dyn VideoSourceFactory>,
    alerts: Arc<dyn AlertSink>,
    shared: Arc<Shared>,
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl StreamCapture {
    /// Creates a new stream capture. Does not open the stream; call
    /// [`StreamCapture::start`].
    pub fn new(
        config: CaptureConfig,
        factory: Arc<dyn VideoSourceFactory>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            factory,
            alerts,
            shared: Arc::new(Shared::new()),
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the capture worker. Idempotent.
    pub fn start(&self) -> std::io::Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Capture already running for {}", self.config.camera_id);
            return Ok(());
        }

        let (stop_tx, stop_rx) = bounded(1);
        let config = self.config.clone();
        let factory = self.factory.clone();
        let alerts = self.alerts.clone();
        let shared = self.shared.clone();

        let handle = thread::Builder::new()
            .name("stream-capture".to_string())
            .spawn(move || capture_loop(config, factory, alerts, shared, stop_rx))?;

        *self.stop_tx.lock().unwrap() = Some(stop_tx);
        *self.worker.lock().unwrap() = Some(handle);

        info!("Capture worker started for {}", self.config.camera_id);
        Ok(())
    }

    /// Signals the worker and joins it. Aborts a reconnect sleep promptly.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        if let Some(stop_tx) = self.stop_tx.lock().unwrap().take() {
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                error!("Capture worker for {} panicked", self.config.camera_id);
            }
        }

        info!(
            "Capture stopped for {} after {} frames, {} errors",
            self.config.camera_id,
            self.shared.frame_count.load(Ordering::Relaxed),
            self.shared.error_count.load(Ordering::Relaxed),
        );
    }

    /// Returns the most recent frame, if any has ever arrived.
    ///
    /// Non-blocking; repeated reads without a new frame return the same
    /// frame again (a shallow copy of the shared pixel buffer).
    pub fn read_latest(&self) -> Option<Frame> {
        self.shared.latest.lock().unwrap().clone()
    }

    /// Returns a snapshot of the capture state.
    pub fn status(&self) -> CaptureStatus {
        let timing = self.shared.timing.lock().unwrap();
        CaptureStatus {
            connected: self.shared.connected.load(Ordering::Relaxed),
            running: self.shared.running.load(Ordering::Relaxed),
            frame_count: self.shared.frame_count.load(Ordering::Relaxed),
            error_count: self.shared.error_count.load(Ordering::Relaxed),
            retry_count: self.shared.retry_count.load(Ordering::Relaxed),
            last_frame_time: timing.last_frame_time,
            connection_start_time: timing.connection_start_time,
            current_retry_delay_secs: timing
                .current_retry_delay
                .unwrap_or(self.config.initial_retry_delay)
                .as_secs_f64(),
        }
    }

    /// Returns true if the stream is currently connected.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }
}

fn capture_loop(
    config: CaptureConfig,
    factory: Arc<dyn VideoSourceFactory>,
    alerts: Arc<dyn AlertSink>,
    shared: Arc<Shared>,
    stop_rx: Receiver<()>,
) {
    let mut backoff = ReconnectBackoff::new(config.initial_retry_delay, config.max_retry_delay);
    let spec = StreamSpec {
        url: config.rtsp_url.clone(),
        buffer_size: config.frame_buffer_size,
    };
    let mut source: Option<Box<dyn VideoSource>> = None;
    // The sequence survives reconnects; consumers rely on it being
    // monotonic for the lifetime of the capture.
    let mut sequence: u64 = 0;

    while shared.running.load(Ordering::SeqCst) {
        if source.is_none() {
            match factory.open(&spec) {
                Ok(opened) => {
                    shared.connected.store(true, Ordering::Relaxed);
                    shared.timing.lock().unwrap().connection_start_time = Some(Utc::now());
                    info!("Connected to stream for {}", config.camera_id);
                    source = Some(opened);
                }
                Err(e) => {
                    warn!("Connection failed for {}: {}", config.camera_id, e);
                    if !wait_for_retry(&config, &alerts, &shared, &mut backoff, &stop_rx) {
                        break;
                    }
                    continue;
                }
            }
        }

        let result = source
            .as_mut()
            .map(|s| s.read())
            .unwrap_or(Err(CaptureError::Read("no source".to_string())));

        match result {
            Ok(raw) if raw.is_complete() => {
                sequence += 1;
                publish_frame(&config, &alerts, &shared, &mut backoff, sequence, raw);
            }
            Ok(_) => {
                handle_read_error(&config, &shared, CaptureError::CorruptFrame);
                source = None;
                if !wait_for_retry(&config, &alerts, &shared, &mut backoff, &stop_rx) {
                    break;
                }
            }
            Err(e) => {
                handle_read_error(&config, &shared, e);
                source = None;
                if !wait_for_retry(&config, &alerts, &shared, &mut backoff, &stop_rx) {
                    break;
                }
            }
        }
    }

    shared.connected.store(false, Ordering::Relaxed);
    debug!("Capture loop exited for {}", config.camera_id);
}

fn publish_frame(
    config: &CaptureConfig,
    alerts: &Arc<dyn AlertSink>,
    shared: &Arc<Shared>,
    backoff: &mut ReconnectBackoff,
    sequence: u64,
    raw: RawFrame,
) {
    let previous_errors = shared.error_count.swap(0, Ordering::Relaxed);
    if previous_errors > 0 {
        info!(
            "Stream recovered for {} after {} errors",
            config.camera_id, previous_errors
        );
        alerts.emit(
            Alert::new(
                AlertLevel::Info,
                format!("Camera {} stream recovered", config.camera_id),
                &config.service_name,
                &config.camera_id,
            )
            .with_metadata(serde_json::json!({ "previous_errors": previous_errors })),
        );
    }
    shared.retry_count.store(0, Ordering::Relaxed);
    backoff.reset();

    let frame = Frame::new(sequence, raw.width, raw.height, raw.data);
    {
        let mut timing = shared.timing.lock().unwrap();
        timing.last_frame_time = Some(frame.captured_at());
        timing.current_retry_delay = None;
    }
    *shared.latest.lock().unwrap() = Some(frame);
    shared.frame_count.fetch_add(1, Ordering::Relaxed);
}

fn handle_read_error(config: &CaptureConfig, shared: &Arc<Shared>, error: CaptureError) {
    let errors = shared.error_count.fetch_add(1, Ordering::Relaxed) + 1;
    shared.connected.store(false, Ordering::Relaxed);
    error!(
        "Frame read failed for {} ({} consecutive): {}",
        config.camera_id, errors, error
    );
}

/// Sleeps out the backoff delay, escalating alerts at the retry
/// thresholds. Returns false if a stop was requested during the sleep.
fn wait_for_retry(
    config: &CaptureConfig,
    alerts: &Arc<dyn AlertSink>,
    shared: &Arc<Shared>,
    backoff: &mut ReconnectBackoff,
    stop_rx: &Receiver<()>,
) -> bool {
    let retries = shared.retry_count.fetch_add(1, Ordering::Relaxed) + 1;

    match retries {
        WARNING_RETRY_THRESHOLD => alerts.emit(
            Alert::new(
                AlertLevel::Warning,
                format!(
                    "Camera {} unreachable for {} attempts",
                    config.camera_id, retries
                ),
                &config.service_name,
                &config.camera_id,
            )
            .with_metadata(serde_json::json!({ "retry_count": retries })),
        ),
        CRITICAL_RETRY_THRESHOLD => alerts.emit(
            Alert::new(
                AlertLevel::Critical,
                format!(
                    "Camera {} still unreachable after {} attempts",
                    config.camera_id, retries
                ),
                &config.service_name,
                &config.camera_id,
            )
            .with_metadata(serde_json::json!({ "retry_count": retries })),
        ),
        _ => {}
    }

    let delay = backoff.next_delay();
    shared.timing.lock().unwrap().current_retry_delay = Some(delay);
    info!(
        "Retry #{} for {} in {:.1}s",
        retries,
        config.camera_id,
        delay.as_secs_f64()
    );

    match stop_rx.recv_timeout(delay) {
        Err(RecvTimeoutError::Timeout) => true,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
    }
}
