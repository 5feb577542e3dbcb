//! Frame Pipeline
//!
//! One processing tick end to end: count persons, and on recognition
//! frames run detection → crop → embed → match → (optionally verify) →
//! publish. Per-face failures drop the face, never the frame.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use crate::application::services::{
    DetectionStage, EmbeddingStage, FaceTracker, IdentityMatcher, Scheduler, TemporalVerifier,
    TickPlan,
};
use crate::domain::entities::{Detection, EnrollmentSnapshot, Frame, FrameDecision};
use crate::domain::events::{FaceEvent, PersonCountEvent};
use crate::domain::value_objects::BoundingBox;
use crate::infrastructure::config::PublishMode;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::publisher::EventPublisher;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub camera_id: String,
    pub recognize_every_n: u64,
    pub publish_mode: PublishMode,
}

/// Counters shared with the status surface.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_processed: AtomicU64,
    recognitions: AtomicU64,
    active_tracks: AtomicUsize,
}

impl PipelineStats {
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn recognitions(&self) -> u64 {
        self.recognitions.load(Ordering::Relaxed)
    }

    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::Relaxed)
    }
}

/// Shared handle to the enrollment snapshot.
///
/// Replacement is an atomic `Arc` swap behind the lock; readers clone the
/// `Arc` once per frame and work against an immutable snapshot.
pub type EnrollmentHandle = Arc<RwLock<Arc<EnrollmentSnapshot>>>;

/// The per-tick processing engine.
///
/// Owned by the single processing task; stages run one at a time, so the
/// inference contract of one active call per model holds by construction.
pub struct FramePipeline {
    config: PipelineConfig,
    scheduler: Scheduler,
    detection_stage: DetectionStage,
    embedding_stage: EmbeddingStage,
    matcher: IdentityMatcher,
    verifier: TemporalVerifier,
    tracker: Box<dyn FaceTracker>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<dyn MetricsSink>,
    enrollment: EnrollmentHandle,
    stats: Arc<PipelineStats>,
}

impl FramePipeline {
    /// Creates a new pipeline.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        detection_stage: DetectionStage,
        embedding_stage: EmbeddingStage,
        matcher: IdentityMatcher,
        verifier: TemporalVerifier,
        tracker: Box<dyn FaceTracker>,
        publisher: Arc<EventPublisher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let scheduler = Scheduler::new(config.recognize_every_n);
        Self {
            config,
            scheduler,
            detection_stage,
            embedding_stage,
            matcher,
            verifier,
            tracker,
            publisher,
            metrics,
            enrollment: Arc::new(RwLock::new(Arc::new(EnrollmentSnapshot::default()))),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Handle for swapping the enrollment snapshot.
    pub fn enrollment_handle(&self) -> EnrollmentHandle {
        self.enrollment.clone()
    }

    /// Shared pipeline counters.
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Processes one frame according to the scheduler's plan.
    pub async fn process_frame(&mut self, frame: Frame) {
        let plan = self.scheduler.tick();
        let started = Instant::now();

        let persons = self.detection_stage.detect_persons(&frame).await;
        let count_event =
            PersonCountEvent::new(&self.config.camera_id, plan.frame_seq, persons.len());
        if let Err(e) = self.publisher.emit_person_count(&count_event).await {
            warn!("Person count publish failed: {}", e);
        }

        if plan.run_recognition {
            self.run_recognition(&frame, plan).await;
        }

        self.metrics.observe_frame_time(started.elapsed());
        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    async fn run_recognition(&mut self, frame: &Frame, plan: TickPlan) {
        self.stats.recognitions.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.enrollment.read().unwrap().clone();
        let faces = self.detection_stage.detect_faces(frame).await;

        let track_ids = match self.config.publish_mode {
            PublishMode::Verified => {
                let boxes: Vec<BoundingBox> =
                    faces.iter().map(|d| d.bounding_box().clone()).collect();
                Some(self.tracker.assign(plan.frame_seq, &boxes))
            }
            PublishMode::PerFrame => None,
        };

        for (index, face) in faces.iter().enumerate() {
            let Some(crop) = self.detection_stage.crop_face(frame, face) else {
                continue;
            };
            let Some(embedding) = self.embedding_stage.extract(&crop).await else {
                continue;
            };

            let decision = self.matcher.match_embedding(&embedding, &snapshot);

            match self.config.publish_mode {
                PublishMode::PerFrame => {
                    if decision.is_match() {
                        self.publish_match(&decision, face, plan).await;
                    }
                }
                PublishMode::Verified => {
                    let Some(track_id) = track_ids.as_ref().and_then(|ids| ids.get(index))
                    else {
                        continue;
                    };
                    let now = Utc::now();
                    self.verifier.observe(track_id, decision, now);
                    if let Some(verdict) = self.verifier.verify(track_id, now) {
                        if verdict.is_match() {
                            self.publish_match(&verdict, face, plan).await;
                        }
                    }
                }
            }

            // Keep the cooperative peers responsive between faces.
            tokio::task::yield_now().await;
        }

        if self.config.publish_mode == PublishMode::Verified {
            self.verifier.evict_stale(Utc::now());
            self.stats
                .active_tracks
                .store(self.verifier.active_tracks(), Ordering::Relaxed);
        }
    }

    async fn publish_match(&self, decision: &FrameDecision, face: &Detection, plan: TickPlan) {
        let (Some(person_id), Some(full_name)) = (decision.identity_id(), decision.display_name())
        else {
            return;
        };

        let event = FaceEvent::new(
            &self.config.camera_id,
            plan.frame_seq,
            person_id,
            full_name,
            decision.mean_similarity(),
            decision.agreement_ratio(),
            decision.outcome(),
            face.bounding_box(),
        );

        if let Err(e) = self.publisher.emit_face_event(&event).await {
            warn!("Face event publish failed: {}", e);
        }
        self.publisher.broadcast_face(&event).await;
    }
}
