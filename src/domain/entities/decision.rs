//! Frame Decision Entity
//!
//! The outcome of matching one query embedding against the enrollment
//! snapshot, and the per-track observations fed to temporal verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identification outcome for a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    /// The best candidate cleared the voting threshold.
    #[serde(rename = "MATCH")]
    Match,
    /// A best candidate existed but failed the agreement threshold.
    #[serde(rename = "NO_MATCH")]
    NoMatch,
    /// No enrolled identities were eligible.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl DecisionOutcome {
    /// Wire name of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Match => "MATCH",
            DecisionOutcome::NoMatch => "NO_MATCH",
            DecisionOutcome::Unknown => "UNKNOWN",
        }
    }
}

/// The result of one identification decision.
///
/// On `NoMatch` the best candidate is still carried for diagnostics; on
/// `Unknown` every field is zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDecision {
    identity_id: Option<String>,
    display_name: Option<String>,
    mean_similarity: f32,
    agreeing_embeddings: usize,
    total_embeddings: usize,
    agreement_ratio: f32,
    outcome: DecisionOutcome,
}

impl FrameDecision {
    /// Creates a decision for a candidate identity.
    pub fn new(
        identity_id: impl Into<String>,
        display_name: impl Into<String>,
        mean_similarity: f32,
        agreeing_embeddings: usize,
        total_embeddings: usize,
        agreement_ratio: f32,
        outcome: DecisionOutcome,
    ) -> Self {
        Self {
            identity_id: Some(identity_id.into()),
            display_name: Some(display_name.into()),
            mean_similarity,
            agreeing_embeddings,
            total_embeddings,
            agreement_ratio,
            outcome,
        }
    }

    /// A decision with no eligible enrolled identities.
    pub fn unknown() -> Self {
        Self {
            identity_id: None,
            display_name: None,
            mean_similarity: 0.0,
            agreeing_embeddings: 0,
            total_embeddings: 0,
            agreement_ratio: 0.0,
            outcome: DecisionOutcome::Unknown,
        }
    }

    /// A no-match decision without a candidate (used by the temporal
    /// verifier when no observation in the window matched).
    pub fn no_match(total_embeddings: usize) -> Self {
        Self {
            identity_id: None,
            display_name: None,
            mean_similarity: 0.0,
            agreeing_embeddings: 0,
            total_embeddings,
            agreement_ratio: 0.0,
            outcome: DecisionOutcome::NoMatch,
        }
    }

    pub fn identity_id(&self) -> Option<&str> {
        self.identity_id.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn mean_similarity(&self) -> f32 {
        self.mean_similarity
    }

    pub fn agreeing_embeddings(&self) -> usize {
        self.agreeing_embeddings
    }

    pub fn total_embeddings(&self) -> usize {
        self.total_embeddings
    }

    pub fn agreement_ratio(&self) -> f32 {
        self.agreement_ratio
    }

    pub fn outcome(&self) -> DecisionOutcome {
        self.outcome
    }

    pub fn is_match(&self) -> bool {
        self.outcome == DecisionOutcome::Match
    }
}

/// One identification decision attached to a tracked person at a point in
/// time. Observations accumulate per track inside the temporal verifier.
#[derive(Debug, Clone)]
pub struct TrackObservation {
    timestamp: DateTime<Utc>,
    decision: FrameDecision,
}

impl TrackObservation {
    /// Creates a new observation.
    pub fn new(timestamp: DateTime<Utc>, decision: FrameDecision) -> Self {
        Self {
            timestamp,
            decision,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn decision(&self) -> &FrameDecision {
        &self.decision
    }
}
