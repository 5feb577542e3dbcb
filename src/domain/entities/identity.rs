//! Enrolled Identity Entity
//!
//! Identities known to the system, each with one or more reference
//! embeddings captured at enrollment time.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::FaceEmbedding;

/// A person enrolled for identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledIdentity {
    identity_id: String,
    display_name: String,
    active: bool,
    embeddings: Vec<FaceEmbedding>,
}

impl EnrolledIdentity {
    /// Creates a new enrolled identity.
    pub fn new(
        identity_id: impl Into<String>,
        display_name: impl Into<String>,
        active: bool,
        embeddings: Vec<FaceEmbedding>,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            display_name: display_name.into(),
            active,
            embeddings,
        }
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The enrolled reference embeddings, in enrollment order.
    pub fn embeddings(&self) -> &[FaceEmbedding] {
        &self.embeddings
    }

    /// Number of enrolled reference embeddings.
    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }
}

/// An immutable snapshot of the enrollment registry.
///
/// The registry is owned by the external enrollment collaborator; the core
/// loads a snapshot at startup and replaces it wholesale, never mutating in
/// place. Readers hold the snapshot behind an `Arc` for the duration of a
/// frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    identities: Vec<EnrolledIdentity>,
}

impl EnrollmentSnapshot {
    /// Creates a snapshot from a list of identities, preserving order.
    pub fn new(identities: Vec<EnrolledIdentity>) -> Self {
        Self { identities }
    }

    /// All identities, active or not, in load order.
    pub fn identities(&self) -> &[EnrolledIdentity] {
        &self.identities
    }

    /// Active identities that have at least one enrolled embedding.
    pub fn eligible(&self) -> impl Iterator<Item = &EnrolledIdentity> {
        self.identities
            .iter()
            .filter(|i| i.is_active() && !i.embeddings().is_empty())
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Number of identities eligible for matching.
    pub fn eligible_count(&self) -> usize {
        self.eligible().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, active: bool, embedding_count: usize) -> EnrolledIdentity {
        let embeddings = (0..embedding_count)
            .map(|_| FaceEmbedding::new(vec![1.0, 0.0]))
            .collect();
        EnrolledIdentity::new(id, format!("Name {id}"), active, embeddings)
    }

    #[test]
    fn eligible_skips_inactive_identities() {
        let snapshot = EnrollmentSnapshot::new(vec![
            identity("EMP001", true, 2),
            identity("EMP002", false, 2),
        ]);
        assert_eq!(snapshot.eligible_count(), 1);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn eligible_skips_identities_without_embeddings() {
        let snapshot = EnrollmentSnapshot::new(vec![identity("EMP001", true, 0)]);
        assert_eq!(snapshot.eligible_count(), 0);
    }

    #[test]
    fn empty_snapshot_has_no_eligible_identities() {
        let snapshot = EnrollmentSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.eligible_count(), 0);
    }
}
