//! Core Orchestrator
//!
//! Owns every subsystem and the processing loop that drives them. The
//! external HTTP collaborator consumes the health/ready/status surface
//! exposed here; nothing in the core serves HTTP itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::pipeline::{
    EnrollmentHandle, FramePipeline, PipelineConfig, PipelineStats,
};
use crate::application::services::{
    DetectionStage, DetectionStageConfig, EmbeddingStage, FaceTracker, IdentityMatcher,
    MatcherConfig, TemporalVerifier, VerifierConfig,
};
use crate::domain::entities::EnrollmentSnapshot;
use crate::domain::events::Alert;
use crate::infrastructure::alerts::ChannelAlertSink;
use crate::infrastructure::capture::{CaptureStatus, StreamCapture, VideoSourceFactory};
use crate::infrastructure::config::{AppConfig, PublishMode};
use crate::infrastructure::enrollment::EnrollmentProvider;
use crate::infrastructure::inference::{Embedder, FaceDetector, PersonDetector};
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::publisher::{
    EventPublisher, EventTransport, PublisherStatus, TransportResult,
};

/// Idle wait when the capture slot has no frame yet.
const IDLE_TICK: Duration = Duration::from_millis(10);
/// Capacity of the capture-to-processing alert channel.
const ALERT_CHANNEL_CAPACITY: usize = 64;

/// The injected collaborators the core builds on.
pub struct Collaborators {
    pub transport: Arc<dyn EventTransport>,
    pub video_source: Arc<dyn VideoSourceFactory>,
    pub person_detector: Arc<dyn PersonDetector>,
    pub face_detector: Arc<dyn FaceDetector>,
    pub embedder: Arc<dyn Embedder>,
    pub enrollment: Arc<dyn EnrollmentProvider>,
    pub tracker: Box<dyn FaceTracker>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// Minimal liveness view for the health endpoint collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub running: bool,
    pub connected: bool,
    pub frames_processed: u64,
}

/// Aggregated status of every subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub running: bool,
    pub publish_mode: PublishMode,
    pub frames_processed: u64,
    pub recognitions: u64,
    pub active_tracks: usize,
    pub enrolled_identities: usize,
    pub capture: CaptureStatus,
    pub publisher: PublisherStatus,
}

/// The assembled pipeline service.
pub struct Core {
    config: AppConfig,
    capture: Arc<StreamCapture>,
    publisher: Arc<EventPublisher>,
    enrollment_provider: Arc<dyn EnrollmentProvider>,
    enrollment: EnrollmentHandle,
    stats: Arc<PipelineStats>,
    running: Arc<AtomicBool>,
    pipeline: Mutex<Option<FramePipeline>>,
    alerts_rx: Mutex<Option<Receiver<Alert>>>,
    loop_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Core {
    /// Wires up all subsystems. Construction order: publisher, capture,
    /// detection/embedding stages, matcher, verifier.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let publisher = Arc::new(EventPublisher::new(
            collaborators.transport,
            config.publisher_config(),
        ));

        let (alert_sink, alerts_rx) = ChannelAlertSink::bounded(ALERT_CHANNEL_CAPACITY);
        let capture = Arc::new(StreamCapture::new(
            config.capture_config(),
            collaborators.video_source,
            Arc::new(alert_sink),
        ));

        let detection_stage = DetectionStage::new(
            collaborators.person_detector,
            collaborators.face_detector,
            DetectionStageConfig {
                person_conf_threshold: config.person_conf_threshold,
                face_conf_threshold: config.face_conf_threshold,
                min_face_size: config.min_face_size,
                crop_margin: config.crop_margin,
            },
        );
        let embedding_stage = EmbeddingStage::new(collaborators.embedder, config.embedding_dim);

        let matcher = IdentityMatcher::new(MatcherConfig {
            similarity_threshold: config.similarity_threshold,
            voting_threshold: config.voting_threshold,
        });
        let verifier = TemporalVerifier::new(VerifierConfig {
            verification_frames: config.verification_frames,
            verification_interval: config.verification_interval,
            history_ttl: config.history_ttl,
        });

        let pipeline = FramePipeline::new(
            PipelineConfig {
                camera_id: config.camera_id.clone(),
                recognize_every_n: config.recognize_every_n,
                publish_mode: config.publish_mode,
            },
            detection_stage,
            embedding_stage,
            matcher,
            verifier,
            collaborators.tracker,
            publisher.clone(),
            collaborators.metrics,
        );

        Self {
            enrollment: pipeline.enrollment_handle(),
            stats: pipeline.stats(),
            config,
            capture,
            publisher,
            enrollment_provider: collaborators.enrollment,
            running: Arc::new(AtomicBool::new(false)),
            pipeline: Mutex::new(Some(pipeline)),
            alerts_rx: Mutex::new(Some(alerts_rx)),
            loop_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Loads enrollment, starts capture, and spawns the processing loop.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Core already running");
            return Ok(());
        }

        let loaded = self.load_snapshot().await?;
        info!(
            "Starting {} for {} with {} enrolled identities ({:?} publishing)",
            self.config.service_name, self.config.camera_id, loaded, self.config.publish_mode
        );

        self.capture.start().context("spawning capture worker")?;

        let pipeline = self
            .pipeline
            .lock()
            .unwrap()
            .take()
            .context("core was already started once")?;
        let alerts_rx = self
            .alerts_rx
            .lock()
            .unwrap()
            .take()
            .context("core was already started once")?;

        let task = tokio::spawn(processing_loop(
            self.running.clone(),
            self.capture.clone(),
            self.publisher.clone(),
            pipeline,
            alerts_rx,
        ));
        *self.loop_task.lock().await = Some(task);

        Ok(())
    }

    /// Stops the processing loop first, then capture; in-flight work for
    /// the current frame completes before the loop exits.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping {}", self.config.service_name);

        if let Some(task) = self.loop_task.lock().await.take() {
            if task.await.is_err() {
                warn!("Processing loop ended abnormally");
            }
        }

        let capture = self.capture.clone();
        if tokio::task::spawn_blocking(move || capture.stop()).await.is_err() {
            warn!("Capture shutdown ended abnormally");
        }

        info!(
            "Stopped after {} frames ({} recognitions)",
            self.stats.frames_processed(),
            self.stats.recognitions()
        );
    }

    /// Reloads the enrollment snapshot and swaps it in atomically.
    /// Returns the number of identities now enrolled.
    pub async fn reload_enrollment(&self) -> Result<usize> {
        self.load_snapshot().await
    }

    /// Minimal liveness view.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            running: self.running.load(Ordering::Relaxed),
            connected: self.capture.is_connected(),
            frames_processed: self.stats.frames_processed(),
        }
    }

    /// True when the service can currently deliver its contract.
    pub async fn ready(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self.capture.is_connected()
            && self.publisher.is_reachable().await
    }

    /// Aggregated status of every subsystem.
    pub async fn status(&self) -> CoreStatus {
        CoreStatus {
            running: self.running.load(Ordering::Relaxed),
            publish_mode: self.config.publish_mode,
            frames_processed: self.stats.frames_processed(),
            recognitions: self.stats.recognitions(),
            active_tracks: self.stats.active_tracks(),
            enrolled_identities: self.enrollment.read().unwrap().len(),
            capture: self.capture.status(),
            publisher: self.publisher.status().await,
        }
    }

    /// Drains the buffered events into the primary log. Operator trigger.
    pub async fn sync_buffer(&self) -> TransportResult<usize> {
        self.publisher.drain_buffer().await
    }

    async fn load_snapshot(&self) -> Result<usize> {
        let snapshot = self
            .enrollment_provider
            .load_enrollment()
            .await
            .context("loading enrollment")?;
        self.check_dimensions(&snapshot)?;

        let count = snapshot.len();
        *self.enrollment.write().unwrap() = Arc::new(snapshot);
        Ok(count)
    }

    fn check_dimensions(&self, snapshot: &EnrollmentSnapshot) -> Result<()> {
        for identity in snapshot.identities() {
            for embedding in identity.embeddings() {
                if embedding.dim() != self.config.embedding_dim {
                    bail!(
                        "identity {} has a {}-dim embedding, expected {}",
                        identity.identity_id(),
                        embedding.dim(),
                        self.config.embedding_dim
                    );
                }
            }
        }
        Ok(())
    }
}

/// Single-task cooperative processing loop. Each iteration handles at
/// most one frame; pending capture alerts are forwarded first so outage
/// escalation is not delayed behind recognition work.
async fn processing_loop(
    running: Arc<AtomicBool>,
    capture: Arc<StreamCapture>,
    publisher: Arc<EventPublisher>,
    mut pipeline: FramePipeline,
    alerts_rx: Receiver<Alert>,
) {
    info!("Processing loop started");

    while running.load(Ordering::SeqCst) {
        while let Ok(alert) = alerts_rx.try_recv() {
            publisher.emit_alert(&alert).await;
        }

        match capture.read_latest() {
            Some(frame) => pipeline.process_frame(frame).await,
            None => tokio::time::sleep(IDLE_TICK).await,
        }
    }

    // Final attempt at whatever escalation is still queued.
    while let Ok(alert) = alerts_rx.try_recv() {
        publisher.emit_alert(&alert).await;
    }

    info!("Processing loop exited");
}
