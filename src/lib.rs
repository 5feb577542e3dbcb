//! Facewatch Library
//!
//! Real-time face identification pipeline: one RTSP camera in,
//! identification events out. Re-exports the main components for use in
//! tests and binaries.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Collaborators, Core, CoreStatus, HealthStatus};
pub use domain::entities;
pub use domain::events;
pub use domain::value_objects;
pub use infrastructure::config::AppConfig;
