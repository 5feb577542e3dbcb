//! Domain Entities

mod decision;
mod detection;
mod frame;
mod identity;

pub use decision::{DecisionOutcome, FrameDecision, TrackObservation};
pub use detection::{Detection, DetectionClass};
pub use frame::{Frame, FRAME_CHANNELS};
pub use identity::{EnrolledIdentity, EnrollmentSnapshot};
