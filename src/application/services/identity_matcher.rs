//! Identity Matcher
//!
//! Per-frame voting: every enrolled embedding of an identity acts as an
//! independent weak classifier, and the fraction that agrees with the
//! query decides the match. The agreement ratio is robust to a single bad
//! enrollment sample in a way a nearest-neighbor match is not.

use tracing::debug;

use crate::domain::entities::{DecisionOutcome, EnrollmentSnapshot, FrameDecision};
use crate::domain::value_objects::FaceEmbedding;

/// Identity matcher configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Per-embedding similarity above which an enrolled embedding votes
    /// for its identity.
    pub similarity_threshold: f32,
    /// Fraction of an identity's embeddings that must vote for a MATCH.
    pub voting_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.35,
            voting_threshold: 0.60,
        }
    }
}

/// Matches query embeddings against the enrollment snapshot.
pub struct IdentityMatcher {
    config: MatcherConfig,
}

struct Candidate<'a> {
    identity_id: &'a str,
    display_name: &'a str,
    agreeing: usize,
    total: usize,
    ratio: f32,
    mean: f32,
}

impl IdentityMatcher {
    /// Creates a new identity matcher.
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Decides which enrolled identity, if any, the query embedding
    /// belongs to.
    ///
    /// Deterministic for equal inputs: the best candidate is chosen by
    /// agreement ratio, then mean similarity, then snapshot order.
    pub fn match_embedding(
        &self,
        query: &FaceEmbedding,
        snapshot: &EnrollmentSnapshot,
    ) -> FrameDecision {
        let mut best: Option<Candidate> = None;

        for identity in snapshot.eligible() {
            let total = identity.embedding_count();
            let mut agreeing = 0usize;
            let mut similarity_sum = 0.0f32;

            for enrolled in identity.embeddings() {
                let similarity = query.similarity(enrolled);
                similarity_sum += similarity;
                if similarity > self.config.similarity_threshold {
                    agreeing += 1;
                }
            }

            let candidate = Candidate {
                identity_id: identity.identity_id(),
                display_name: identity.display_name(),
                agreeing,
                total,
                ratio: agreeing as f32 / total as f32,
                mean: similarity_sum / total as f32,
            };

            let better = match &best {
                None => true,
                Some(current) => {
                    candidate.ratio > current.ratio
                        || (candidate.ratio == current.ratio && candidate.mean > current.mean)
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        let Some(winner) = best else {
            return FrameDecision::unknown();
        };

        let outcome = if winner.ratio >= self.config.voting_threshold {
            DecisionOutcome::Match
        } else {
            DecisionOutcome::NoMatch
        };

        debug!(
            "Matcher picked {} with {}/{} votes ({:?})",
            winner.identity_id, winner.agreeing, winner.total, outcome
        );

        FrameDecision::new(
            winner.identity_id,
            winner.display_name,
            winner.mean,
            winner.agreeing,
            winner.total,
            winner.ratio,
            outcome,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EnrolledIdentity;

    const DIM: usize = 32;

    /// Builds a unit vector whose remapped similarity against `query()`
    /// is exactly `target`.
    fn embedding_with_similarity(target: f32) -> FaceEmbedding {
        let cosine = 2.0 * target - 1.0;
        let mut values = vec![0.0f32; DIM];
        values[0] = cosine;
        values[1] = (1.0 - cosine * cosine).max(0.0).sqrt();
        FaceEmbedding::new(values)
    }

    fn query() -> FaceEmbedding {
        let mut values = vec![0.0f32; DIM];
        values[0] = 1.0;
        FaceEmbedding::new(values)
    }

    fn identity(id: &str, name: &str, similarities: &[f32]) -> EnrolledIdentity {
        let embeddings = similarities
            .iter()
            .map(|s| embedding_with_similarity(*s))
            .collect();
        EnrolledIdentity::new(id, name, true, embeddings)
    }

    fn matcher() -> IdentityMatcher {
        IdentityMatcher::new(MatcherConfig::default())
    }

    #[test]
    fn empty_snapshot_is_unknown() {
        let decision = matcher().match_embedding(&query(), &EnrollmentSnapshot::default());
        assert_eq!(decision.outcome(), DecisionOutcome::Unknown);
        assert!(decision.identity_id().is_none());
    }

    #[test]
    fn inactive_identities_are_ignored() {
        let snapshot = EnrollmentSnapshot::new(vec![EnrolledIdentity::new(
            "EMP001",
            "Jane Doe",
            false,
            vec![embedding_with_similarity(0.9)],
        )]);
        let decision = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(decision.outcome(), DecisionOutcome::Unknown);
    }

    #[test]
    fn four_of_five_agreeing_embeddings_match() {
        let snapshot = EnrollmentSnapshot::new(vec![identity(
            "EMP001",
            "Jane Doe",
            &[0.9, 0.9, 0.9, 0.9, 0.2],
        )]);

        let decision = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(decision.outcome(), DecisionOutcome::Match);
        assert_eq!(decision.identity_id(), Some("EMP001"));
        assert_eq!(decision.agreeing_embeddings(), 4);
        assert_eq!(decision.total_embeddings(), 5);
        assert!((decision.agreement_ratio() - 0.8).abs() < 1e-6);
        assert!((decision.mean_similarity() - 0.76).abs() < 1e-3);
    }

    #[test]
    fn voting_boundary_at_sixty_percent() {
        // Exactly ceil(0.60 * 5) = 3 agreeing embeddings clears the bar.
        let at_boundary = EnrollmentSnapshot::new(vec![identity(
            "EMP001",
            "Jane Doe",
            &[0.9, 0.9, 0.9, 0.2, 0.2],
        )]);
        let decision = matcher().match_embedding(&query(), &at_boundary);
        assert_eq!(decision.outcome(), DecisionOutcome::Match);

        // One fewer vote fails.
        let below = EnrollmentSnapshot::new(vec![identity(
            "EMP001",
            "Jane Doe",
            &[0.9, 0.9, 0.2, 0.2, 0.2],
        )]);
        let decision = matcher().match_embedding(&query(), &below);
        assert_eq!(decision.outcome(), DecisionOutcome::NoMatch);
        assert_eq!(decision.identity_id(), Some("EMP001"));
    }

    #[test]
    fn confuser_with_lower_ratio_loses() {
        let snapshot = EnrollmentSnapshot::new(vec![
            identity("EMP001", "Jane Doe", &[0.9, 0.9, 0.9, 0.2, 0.2]),
            identity("EMP002", "John Roe", &[0.9, 0.9, 0.2, 0.2, 0.2]),
        ]);

        let decision = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(decision.outcome(), DecisionOutcome::Match);
        assert_eq!(decision.identity_id(), Some("EMP001"));
        assert!((decision.agreement_ratio() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn ratio_tie_breaks_on_mean_similarity() {
        let snapshot = EnrollmentSnapshot::new(vec![
            identity("EMP001", "Jane Doe", &[0.5, 0.5]),
            identity("EMP002", "John Roe", &[0.9, 0.9]),
        ]);

        let decision = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(decision.identity_id(), Some("EMP002"));
    }

    #[test]
    fn full_tie_keeps_snapshot_order() {
        let snapshot = EnrollmentSnapshot::new(vec![
            identity("EMP001", "Jane Doe", &[0.9, 0.9]),
            identity("EMP002", "John Roe", &[0.9, 0.9]),
        ]);

        let decision = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(decision.identity_id(), Some("EMP001"));
    }

    #[test]
    fn matching_is_idempotent() {
        let snapshot = EnrollmentSnapshot::new(vec![
            identity("EMP001", "Jane Doe", &[0.9, 0.4, 0.7]),
            identity("EMP002", "John Roe", &[0.6, 0.6, 0.6]),
        ]);

        let first = matcher().match_embedding(&query(), &snapshot);
        let second = matcher().match_embedding(&query(), &snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn similarity_at_threshold_does_not_vote() {
        // Votes require strictly greater similarity than the threshold.
        // Identical embeddings score exactly 1.0, which a 1.0 threshold
        // must not count.
        let config = MatcherConfig {
            similarity_threshold: 1.0,
            voting_threshold: 0.5,
        };
        let snapshot = EnrollmentSnapshot::new(vec![EnrolledIdentity::new(
            "EMP001",
            "Jane Doe",
            true,
            vec![query(), query()],
        )]);

        let decision = IdentityMatcher::new(config).match_embedding(&query(), &snapshot);
        assert_eq!(decision.agreeing_embeddings(), 0);
        assert_eq!(decision.outcome(), DecisionOutcome::NoMatch);
    }
}
