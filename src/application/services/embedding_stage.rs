//! Embedding Stage
//!
//! Feeds face crops to the embedder and attaches a quality score. The
//! embedder re-detects the face inside the crop; crops where it finds
//! nothing are dropped from the frame.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::value_objects::FaceEmbedding;
use crate::infrastructure::inference::{Embedder, FaceCrop, FaceDescriptor};

/// Extracts identity embeddings from face crops.
pub struct EmbeddingStage {
    embedder: Arc<dyn Embedder>,
    embedding_dim: usize,
}

impl EmbeddingStage {
    /// Creates a new embedding stage.
    pub fn new(embedder: Arc<dyn Embedder>, embedding_dim: usize) -> Self {
        Self {
            embedder,
            embedding_dim,
        }
    }

    /// Extracts the embedding for one face crop.
    ///
    /// Returns `None` when the embedder finds no face in the crop, the
    /// returned vector has the wrong dimension, or the backend fails; in
    /// every case the face is dropped and the frame continues.
    pub async fn extract(&self, crop: &FaceCrop) -> Option<FaceEmbedding> {
        let descriptor = match self.embedder.embed(crop).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                debug!("No face found in {}x{} crop", crop.width(), crop.height());
                return None;
            }
            Err(e) => {
                warn!("Embedding extraction failed: {}", e);
                return None;
            }
        };

        if descriptor.embedding.len() != self.embedding_dim {
            warn!(
                "Embedder returned {}-dim vector, expected {}",
                descriptor.embedding.len(),
                self.embedding_dim
            );
            return None;
        }

        let quality = quality_score(&descriptor);
        Some(FaceEmbedding::with_quality(descriptor.embedding, quality))
    }
}

/// Scores how usable a face descriptor is for identification.
///
/// Multiplicative on the detector confidence: implausible ages (possible
/// detection errors) cost 20%, strongly non-frontal poses cost 30%, mildly
/// non-frontal ones 10%.
fn quality_score(descriptor: &FaceDescriptor) -> f32 {
    let mut score = descriptor.confidence;

    if let Some(age) = descriptor.age {
        if !(10.0..=80.0).contains(&age) {
            score *= 0.8;
        }
    }

    if let Some([pitch, yaw, roll]) = descriptor.pose {
        let max_angle = pitch.abs().max(yaw.abs()).max(roll.abs());
        if max_angle > 30.0 {
            score *= 0.7;
        } else if max_angle > 15.0 {
            score *= 0.9;
        }
    }

    score.clamp(0.0, 1.0)
}
