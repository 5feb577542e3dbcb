//! Application Layer
//!
//! Pipeline stages, the per-tick processing engine, and the orchestrator.

pub mod core;
pub mod pipeline;
pub mod services;

pub use self::core::{Collaborators, Core, CoreStatus, HealthStatus};
pub use pipeline::{FramePipeline, PipelineConfig, PipelineStats};
