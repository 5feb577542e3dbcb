//! Temporal Verifier
//!
//! Confirms an identity across several time-spaced observations of the
//! same track before it is trusted, rejecting transient false positives
//! that a single frame can produce.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::entities::{DecisionOutcome, FrameDecision, TrackObservation};

/// Slack added to the verification window so slightly late observations
/// still count.
const WINDOW_SLACK: Duration = Duration::from_secs(5);

/// Temporal verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Observations required for a verdict.
    pub verification_frames: usize,
    /// Expected spacing between observations.
    pub verification_interval: Duration,
    /// Age at which an idle track is evicted.
    pub history_ttl: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            verification_frames: 3,
            verification_interval: Duration::from_secs(1),
            history_ttl: Duration::from_secs(30),
        }
    }
}

/// Multi-frame majority vote over per-track observation history.
///
/// Track ids come from the caller; the verifier only requires them to be
/// stable across the verification window for the same physical person.
/// State is touched exclusively from the processing task, so there is no
/// locking here.
pub struct TemporalVerifier {
    config: VerifierConfig,
    history: HashMap<String, VecDeque<TrackObservation>>,
}

impl TemporalVerifier {
    /// Creates a new temporal verifier.
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    /// Records an observation for a track. History per track is bounded
    /// at twice the verification depth; overflow drops the oldest.
    pub fn observe(&mut self, track_id: &str, decision: FrameDecision, timestamp: DateTime<Utc>) {
        let capacity = self.config.verification_frames * 2;
        let observations = self
            .history
            .entry(track_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        if observations.len() == capacity {
            observations.pop_front();
        }
        observations.push_back(TrackObservation::new(timestamp, decision));
    }

    /// Produces a verified decision for a track, or `None` when the
    /// window does not yet hold enough recent observations.
    pub fn verify(&self, track_id: &str, now: DateTime<Utc>) -> Option<FrameDecision> {
        let observations = self.history.get(track_id)?;
        let required = self.config.verification_frames;
        if observations.len() < required {
            debug!(
                "Track {} has {}/{} observations",
                track_id,
                observations.len(),
                required
            );
            return None;
        }

        let max_age = self.config.verification_interval.as_secs_f64()
            * (required as f64 - 1.0)
            + WINDOW_SLACK.as_secs_f64();

        // Most recent observations inside the window, newest first.
        let mut recent: Vec<&TrackObservation> = Vec::with_capacity(required);
        for observation in observations.iter().rev() {
            let age = (now - observation.timestamp())
                .to_std()
                .unwrap_or_default()
                .as_secs_f64();
            if age > max_age {
                continue;
            }
            recent.push(observation);
            if recent.len() == required {
                break;
            }
        }

        if recent.len() < required {
            debug!(
                "Track {} has only {}/{} observations inside the window",
                track_id,
                recent.len(),
                required
            );
            return None;
        }

        self.check_spacing(track_id, &recent);
        Some(self.vote_across_frames(track_id, &recent))
    }

    /// Warns when observations are bunched closer than half the expected
    /// interval; verdicts from near-simultaneous frames are weaker than
    /// the window suggests.
    fn check_spacing(&self, track_id: &str, recent: &[&TrackObservation]) {
        if recent.len() < 2 {
            return;
        }

        let mut total = 0.0f64;
        for pair in recent.windows(2) {
            let gap = (pair[0].timestamp() - pair[1].timestamp())
                .to_std()
                .unwrap_or_default();
            total += gap.as_secs_f64();
        }
        let average = total / (recent.len() - 1) as f64;

        if average < self.config.verification_interval.as_secs_f64() / 2.0 {
            warn!(
                "Track {} observations averaged {:.2}s apart, expected {:.2}s",
                track_id,
                average,
                self.config.verification_interval.as_secs_f64()
            );
        }
    }

    /// Majority vote over the selected observations, newest first.
    fn vote_across_frames(&self, track_id: &str, recent: &[&TrackObservation]) -> FrameDecision {
        let total_frames = recent.len();

        // Per-identity tallies in recency order, so a vote-count tie
        // resolves to the most recently seen identity.
        let mut tallies: Vec<(&str, &TrackObservation, usize, f32)> = Vec::new();
        for observation in recent {
            let decision = observation.decision();
            if decision.outcome() != DecisionOutcome::Match {
                continue;
            }
            let Some(identity_id) = decision.identity_id() else {
                continue;
            };

            match tallies.iter_mut().find(|(id, ..)| *id == identity_id) {
                Some((_, _, votes, similarity_sum)) => {
                    *votes += 1;
                    *similarity_sum += decision.mean_similarity();
                }
                None => tallies.push((identity_id, observation, 1, decision.mean_similarity())),
            }
        }

        if tallies.is_empty() {
            return FrameDecision::no_match(total_frames);
        }

        let mut winner = &tallies[0];
        for tally in &tallies[1..] {
            if tally.2 > winner.2 {
                winner = tally;
            }
        }
        let (identity_id, newest, votes, similarity_sum) = *winner;

        let agreement_ratio = votes as f32 / total_frames as f32;
        let outcome = if agreement_ratio > 0.5 {
            DecisionOutcome::Match
        } else {
            DecisionOutcome::NoMatch
        };

        debug!(
            "Track {} verified as {:?} for {} with {}/{} votes",
            track_id, outcome, identity_id, votes, total_frames
        );

        FrameDecision::new(
            identity_id,
            newest.decision().display_name().unwrap_or_default(),
            similarity_sum / votes as f32,
            votes,
            total_frames,
            agreement_ratio,
            outcome,
        )
    }

    /// Evicts tracks whose newest observation is older than the TTL.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) {
        let ttl = self.config.history_ttl;
        self.history.retain(|track_id, observations| {
            let keep = observations.back().is_some_and(|newest| {
                (now - newest.timestamp()).to_std().unwrap_or_default() <= ttl
            });
            if !keep {
                debug!("Evicting idle track {}", track_id);
            }
            keep
        });
    }

    /// Number of tracks currently holding history.
    pub fn active_tracks(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn match_for(identity: &str, similarity: f32) -> FrameDecision {
        FrameDecision::new(identity, format!("Name {identity}"), similarity, 4, 5, 0.8, DecisionOutcome::Match)
    }

    fn no_match() -> FrameDecision {
        FrameDecision::new("EMP009", "Other", 0.3, 1, 5, 0.2, DecisionOutcome::NoMatch)
    }

    fn verifier() -> TemporalVerifier {
        TemporalVerifier::new(VerifierConfig::default())
    }

    #[test]
    fn too_few_observations_yield_no_verdict() {
        let mut v = verifier();
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("A", 0.9), at(1));
        assert!(v.verify("T", at(1)).is_none());
    }

    #[test]
    fn unknown_track_yields_no_verdict() {
        assert!(verifier().verify("ghost", at(0)).is_none());
    }

    #[test]
    fn two_of_three_matches_verify_the_majority_identity() {
        let mut v = verifier();
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("B", 0.8), at(1));
        v.observe("T", match_for("A", 0.9), at(2));

        let verdict = v.verify("T", at(2)).unwrap();
        assert_eq!(verdict.outcome(), DecisionOutcome::Match);
        assert_eq!(verdict.identity_id(), Some("A"));
        assert!((verdict.agreement_ratio() - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(verdict.agreeing_embeddings(), 2);
        assert_eq!(verdict.total_embeddings(), 3);
    }

    #[test]
    fn unanimous_matches_verify_with_full_ratio() {
        let mut v = verifier();
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("A", 0.8), at(1));
        v.observe("T", match_for("A", 0.7), at(2));

        let verdict = v.verify("T", at(2)).unwrap();
        assert_eq!(verdict.identity_id(), Some("A"));
        assert!((verdict.agreement_ratio() - 1.0).abs() < 1e-6);
        assert!((verdict.mean_similarity() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn three_way_split_is_no_match() {
        let mut v = verifier();
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("B", 0.9), at(1));
        v.observe("T", match_for("C", 0.9), at(2));

        let verdict = v.verify("T", at(2)).unwrap();
        assert_eq!(verdict.outcome(), DecisionOutcome::NoMatch);
        assert!((verdict.agreement_ratio() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn window_without_matches_is_no_match_with_window_size() {
        let mut v = verifier();
        v.observe("T", no_match(), at(0));
        v.observe("T", no_match(), at(1));
        v.observe("T", no_match(), at(2));

        let verdict = v.verify("T", at(2)).unwrap();
        assert_eq!(verdict.outcome(), DecisionOutcome::NoMatch);
        assert!(verdict.identity_id().is_none());
        assert_eq!(verdict.total_embeddings(), 3);
    }

    #[test]
    fn observations_outside_the_window_do_not_count() {
        let mut v = verifier();
        // Window for 3 frames at 1s spacing is 2s + 5s slack = 7s.
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("A", 0.9), at(1));
        v.observe("T", match_for("A", 0.9), at(2));

        assert!(v.verify("T", at(20)).is_none());
    }

    #[test]
    fn vote_tie_goes_to_most_recent_identity() {
        let config = VerifierConfig {
            verification_frames: 4,
            ..VerifierConfig::default()
        };
        let mut v = TemporalVerifier::new(config);
        v.observe("T", match_for("A", 0.9), at(0));
        v.observe("T", match_for("A", 0.9), at(1));
        v.observe("T", match_for("B", 0.9), at(2));
        v.observe("T", match_for("B", 0.9), at(3));

        let verdict = v.verify("T", at(3)).unwrap();
        assert_eq!(verdict.identity_id(), Some("B"));
        assert_eq!(verdict.outcome(), DecisionOutcome::NoMatch);
    }

    #[test]
    fn history_is_capped_at_twice_the_depth() {
        let mut v = verifier();
        for i in 0..20 {
            v.observe("T", match_for("A", 0.9), at(i));
        }
        assert_eq!(v.history.get("T").unwrap().len(), 6);
    }

    #[test]
    fn idle_tracks_are_evicted_after_ttl() {
        let mut v = verifier();
        v.observe("old", match_for("A", 0.9), at(0));
        v.observe("fresh", match_for("B", 0.9), at(29));
        assert_eq!(v.active_tracks(), 2);

        v.evict_stale(at(31));
        assert_eq!(v.active_tracks(), 1);
        assert!(v.verify("old", at(31)).is_none());
    }
}
