//! Enrollment Providers
//!
//! The enrolled-identity database is an external collaborator; the core
//! only pulls read-only snapshots through the `EnrollmentProvider`
//! capability.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::domain::entities::{EnrolledIdentity, EnrollmentSnapshot};

/// Result type for enrollment operations.
pub type EnrollmentResult<T> = Result<T, EnrollmentError>;

/// Enrollment error types.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Failed to read enrollment snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse enrollment snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid enrollment data: {0}")]
    Invalid(String),
}

/// Source of enrollment snapshots.
#[async_trait]
pub trait EnrollmentProvider: Send + Sync {
    /// Loads the current enrollment snapshot.
    async fn load_enrollment(&self) -> EnrollmentResult<EnrollmentSnapshot>;
}

/// In-memory provider serving a fixed snapshot. Backs tests and
/// deployments without any enrolled identities.
#[derive(Debug, Clone, Default)]
pub struct StaticEnrollment {
    snapshot: EnrollmentSnapshot,
}

impl StaticEnrollment {
    /// Creates a provider serving the given identities.
    pub fn new(identities: Vec<EnrolledIdentity>) -> Self {
        Self {
            snapshot: EnrollmentSnapshot::new(identities),
        }
    }

    /// Creates a provider with no enrolled identities.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnrollmentProvider for StaticEnrollment {
    async fn load_enrollment(&self) -> EnrollmentResult<EnrollmentSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Provider reading a JSON snapshot exported by the enrollment service.
///
/// The file holds an array of identities with their reference embeddings.
/// Embedding dimensions are validated against the configured dimension at
/// load time, not here.
pub struct JsonFileEnrollment {
    path: PathBuf,
}

impl JsonFileEnrollment {
    /// Creates a provider reading from the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EnrollmentProvider for JsonFileEnrollment {
    async fn load_enrollment(&self) -> EnrollmentResult<EnrollmentSnapshot> {
        let raw = tokio::fs::read(&self.path).await?;
        let identities: Vec<EnrolledIdentity> = serde_json::from_slice(&raw)?;

        if let Some(empty) = identities.iter().find(|i| i.embeddings().is_empty()) {
            return Err(EnrollmentError::Invalid(format!(
                "identity {} has no embeddings",
                empty.identity_id()
            )));
        }

        info!(
            "Loaded {} enrolled identities from {:?}",
            identities.len(),
            self.path
        );
        Ok(EnrollmentSnapshot::new(identities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::FaceEmbedding;

    #[tokio::test]
    async fn static_provider_serves_identities() {
        let provider = StaticEnrollment::new(vec![EnrolledIdentity::new(
            "EMP001",
            "Jane Doe",
            true,
            vec![FaceEmbedding::new(vec![1.0, 0.0])],
        )]);

        let snapshot = provider.load_enrollment().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.eligible_count(), 1);
    }

    #[tokio::test]
    async fn empty_provider_serves_empty_snapshot() {
        let snapshot = StaticEnrollment::empty().load_enrollment().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let provider = JsonFileEnrollment::new("/nonexistent/enrollment.json");
        let err = provider.load_enrollment().await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Io(_)));
    }
}
