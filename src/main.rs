//! Facewatch - Real-time Face Identification Pipeline
//!
//! Ingests one RTSP stream, counts people every frame, identifies faces
//! against the enrolled registry at a reduced cadence, and publishes
//! events over Redis Streams and Pub/Sub.
//!
//! The CNN detectors and embedder are deployment collaborators injected
//! at the capability seams; this binary wires the built-in synthetic
//! backends so the pipeline runs end to end without GPU inference.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facewatch::application::services::IouTracker;
use facewatch::application::{Collaborators, Core};
use facewatch::infrastructure::capture::TestPatternFactory;
use facewatch::infrastructure::config::AppConfig;
use facewatch::infrastructure::enrollment::{
    EnrollmentProvider, JsonFileEnrollment, StaticEnrollment,
};
use facewatch::infrastructure::inference::{MockEmbedder, MockFaceDetector, MockPersonDetector};
use facewatch::infrastructure::metrics::LogMetrics;
use facewatch::infrastructure::publisher::RedisTransport;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting facewatch v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;

    let transport = Arc::new(RedisTransport::new(&config.redis_url)?);

    let enrollment: Arc<dyn EnrollmentProvider> = match &config.enrollment_path {
        Some(path) => Arc::new(JsonFileEnrollment::new(path)),
        None => {
            warn!("No enrollment snapshot configured; every face will resolve to UNKNOWN");
            Arc::new(StaticEnrollment::empty())
        }
    };

    info!("Using the synthetic capture and inference backends");
    let collaborators = Collaborators {
        transport,
        video_source: Arc::new(TestPatternFactory::new(1280, 720, 30)),
        person_detector: Arc::new(MockPersonDetector::synthetic()),
        face_detector: Arc::new(MockFaceDetector::synthetic()),
        embedder: Arc::new(MockEmbedder::empty()),
        enrollment,
        tracker: Box::new(IouTracker::new(0.3, config.recognize_every_n * 3)),
        metrics: Arc::new(LogMetrics),
    };

    let core = Core::new(config, collaborators);
    core.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    core.stop().await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facewatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
