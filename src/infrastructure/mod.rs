//! Infrastructure Layer
//!
//! Everything that touches the outside world: configuration, the capture
//! loop, inference capabilities, enrollment providers, and the event
//! publisher.

pub mod alerts;
pub mod capture;
pub mod config;
pub mod enrollment;
pub mod inference;
pub mod metrics;
pub mod publisher;
