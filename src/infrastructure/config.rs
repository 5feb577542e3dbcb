//! Application Configuration
//!
//! Every tunable of the pipeline in one explicit value, loaded from
//! environment variables at startup and validated before anything spins
//! up. No hidden globals.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::capture::CaptureConfig;
use crate::infrastructure::publisher::PublisherConfig;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RTSP_URL must be provided")]
    MissingRtspUrl,

    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which identification decisions get published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Publish every per-frame MATCH immediately.
    PerFrame,
    /// Publish only temporally verified MATCH decisions.
    Verified,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_frame" => Ok(PublishMode::PerFrame),
            "verified" => Ok(PublishMode::Verified),
            other => Err(other.to_string()),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Service
    pub service_name: String,
    pub camera_id: String,
    pub rtsp_url: String,
    pub redis_url: String,

    // Detection
    pub person_conf_threshold: f32,
    pub face_conf_threshold: f32,
    pub min_face_size: i32,
    pub crop_margin: f32,

    // Recognition
    pub embedding_dim: usize,
    pub similarity_threshold: f32,
    pub voting_threshold: f32,

    // Temporal verification
    pub verification_frames: usize,
    pub verification_interval: Duration,
    pub history_ttl: Duration,

    // Scheduling
    pub recognize_every_n: u64,

    // Capture
    pub frame_buffer_size: usize,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,

    // Publishing
    pub face_events_stream: String,
    pub person_count_stream: String,
    pub buffer_stream: String,
    pub alerts_channel: String,
    pub face_detection_channel: String,
    pub primary_log_max_len: usize,
    pub max_buffer_size: usize,
    pub publish_timeout: Duration,
    pub publish_mode: PublishMode,

    // Enrollment
    pub enrollment_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "facewatch".to_string(),
            camera_id: "camera_01".to_string(),
            rtsp_url: String::new(),
            redis_url: "redis://localhost:6379".to_string(),
            person_conf_threshold: 0.6,
            face_conf_threshold: 0.5,
            min_face_size: 80,
            crop_margin: 0.2,
            embedding_dim: 512,
            similarity_threshold: 0.35,
            voting_threshold: 0.60,
            verification_frames: 3,
            verification_interval: Duration::from_secs(1),
            history_ttl: Duration::from_secs(30),
            recognize_every_n: 30,
            frame_buffer_size: 2,
            initial_retry_delay: Duration::from_secs(30),
            max_retry_delay: Duration::from_secs(300),
            face_events_stream: "stream:face_events".to_string(),
            person_count_stream: "stream:person_count".to_string(),
            buffer_stream: "buffer:face_events".to_string(),
            alerts_channel: "alerts".to_string(),
            face_detection_channel: "face_detected".to_string(),
            primary_log_max_len: 100_000,
            max_buffer_size: 10_000,
            publish_timeout: Duration::from_secs(5),
            publish_mode: PublishMode::PerFrame,
            enrollment_path: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment variables, then validates.
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(camera_id) = std::env::var("CAMERA_ID") {
            config.camera_id = camera_id;
        }
        if let Ok(rtsp_url) = std::env::var("RTSP_URL") {
            config.rtsp_url = rtsp_url;
        }
        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.redis_url = redis_url;
        }

        read_f32(&mut config.person_conf_threshold, "PERSON_CONFIDENCE_THRESHOLD")?;
        read_f32(&mut config.face_conf_threshold, "FACE_CONFIDENCE_THRESHOLD")?;
        read_i32(&mut config.min_face_size, "MIN_FACE_SIZE")?;
        read_f32(&mut config.crop_margin, "CROP_MARGIN")?;
        read_usize(&mut config.embedding_dim, "EMBEDDING_DIM")?;
        read_f32(&mut config.similarity_threshold, "SIMILARITY_THRESHOLD")?;
        read_f32(&mut config.voting_threshold, "VOTING_THRESHOLD")?;
        read_usize(&mut config.verification_frames, "VERIFICATION_FRAMES")?;
        read_secs(&mut config.verification_interval, "VERIFICATION_INTERVAL")?;
        read_secs(&mut config.history_ttl, "HISTORY_TTL")?;
        read_u64(&mut config.recognize_every_n, "PROCESS_EVERY_N_FRAMES")?;
        read_usize(&mut config.frame_buffer_size, "FRAME_BUFFER_SIZE")?;
        read_secs(&mut config.initial_retry_delay, "RECONNECT_DELAY")?;
        read_secs(&mut config.max_retry_delay, "MAX_RECONNECT_DELAY")?;
        read_usize(&mut config.primary_log_max_len, "PRIMARY_LOG_MAX_LEN")?;
        read_usize(&mut config.max_buffer_size, "MAX_BUFFER_SIZE")?;
        read_secs(&mut config.publish_timeout, "PUBLISH_TIMEOUT")?;

        if let Ok(stream) = std::env::var("FACE_EVENTS_STREAM") {
            config.face_events_stream = stream;
        }
        if let Ok(stream) = std::env::var("PERSON_COUNT_STREAM") {
            config.person_count_stream = stream;
        }
        if let Ok(stream) = std::env::var("BUFFER_STREAM") {
            config.buffer_stream = stream;
        }
        if let Ok(channel) = std::env::var("ALERTS_CHANNEL") {
            config.alerts_channel = channel;
        }
        if let Ok(channel) = std::env::var("FACE_DETECTION_CHANNEL") {
            config.face_detection_channel = channel;
        }
        if let Ok(mode) = std::env::var("PUBLISH_MODE") {
            config.publish_mode = mode.parse().map_err(|value| ConfigError::Invalid {
                name: "PUBLISH_MODE",
                value,
            })?;
        }
        if let Ok(path) = std::env::var("ENROLLMENT_PATH") {
            config.enrollment_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates invariants that would otherwise surface as silent
    /// misbehavior deep inside the pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rtsp_url.is_empty() {
            return Err(ConfigError::MissingRtspUrl);
        }

        check_unit("SIMILARITY_THRESHOLD", self.similarity_threshold)?;
        check_unit("VOTING_THRESHOLD", self.voting_threshold)?;
        check_unit("PERSON_CONFIDENCE_THRESHOLD", self.person_conf_threshold)?;
        check_unit("FACE_CONFIDENCE_THRESHOLD", self.face_conf_threshold)?;

        if self.crop_margin < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "CROP_MARGIN",
                min: 0.0,
                max: f64::MAX,
                value: self.crop_margin as f64,
            });
        }

        check_nonzero("MIN_FACE_SIZE", self.min_face_size as usize)?;
        check_nonzero("EMBEDDING_DIM", self.embedding_dim)?;
        check_nonzero("VERIFICATION_FRAMES", self.verification_frames)?;
        check_nonzero("PROCESS_EVERY_N_FRAMES", self.recognize_every_n as usize)?;
        check_nonzero("FRAME_BUFFER_SIZE", self.frame_buffer_size)?;

        Ok(())
    }

    /// Capture configuration slice.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            camera_id: self.camera_id.clone(),
            rtsp_url: self.rtsp_url.clone(),
            service_name: self.service_name.clone(),
            frame_buffer_size: self.frame_buffer_size,
            initial_retry_delay: self.initial_retry_delay,
            max_retry_delay: self.max_retry_delay,
        }
    }

    /// Publisher configuration slice.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            face_events_stream: self.face_events_stream.clone(),
            person_count_stream: self.person_count_stream.clone(),
            buffer_stream: self.buffer_stream.clone(),
            alerts_channel: self.alerts_channel.clone(),
            face_detection_channel: self.face_detection_channel.clone(),
            primary_log_max_len: self.primary_log_max_len,
            max_buffer_size: self.max_buffer_size,
            publish_timeout: self.publish_timeout,
        }
    }
}

fn check_unit(name: &'static str, value: f32) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            name,
            min: 0.0,
            max: 1.0,
            value: value as f64,
        });
    }
    Ok(())
}

fn check_nonzero(name: &'static str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::Zero { name });
    }
    Ok(())
}

fn read_f32(target: &mut f32, name: &'static str) -> ConfigResult<()> {
    if let Ok(raw) = std::env::var(name) {
        *target = raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn read_i32(target: &mut i32, name: &'static str) -> ConfigResult<()> {
    if let Ok(raw) = std::env::var(name) {
        *target = raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn read_u64(target: &mut u64, name: &'static str) -> ConfigResult<()> {
    if let Ok(raw) = std::env::var(name) {
        *target = raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn read_usize(target: &mut usize, name: &'static str) -> ConfigResult<()> {
    if let Ok(raw) = std::env::var(name) {
        *target = raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn read_secs(target: &mut Duration, name: &'static str) -> ConfigResult<()> {
    if let Ok(raw) = std::env::var(name) {
        let secs: f64 = raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        })?;
        if secs < 0.0 {
            return Err(ConfigError::Invalid { name, value: raw });
        }
        *target = Duration::from_secs_f64(secs);
    }
    Ok(())
}
