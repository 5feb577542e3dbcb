//! Face Embedding Value Object
//!
//! A fixed-dimension face embedding vector with its quality score.
//! Reference: https://arxiv.org/abs/1801.07698 (ArcFace)

use serde::{Deserialize, Serialize};

/// Default dimension of face embedding vectors (ArcFace standard).
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// A face embedding vector for identity matching.
///
/// Carries a quality score in `[0, 1]` computed at extraction time from the
/// detector confidence, head pose, and age plausibility. The score is
/// recorded but does not gate matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceEmbedding {
    values: Vec<f32>,
    /// Absent in enrollment snapshots, which store reference vectors only.
    #[serde(default = "full_quality")]
    quality: f32,
}

fn full_quality() -> f32 {
    1.0
}

impl FaceEmbedding {
    /// Creates a new face embedding with full quality.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            quality: 1.0,
        }
    }

    /// Creates a new face embedding with an explicit quality score.
    pub fn with_quality(values: Vec<f32>, quality: f32) -> Self {
        Self {
            values,
            quality: quality.clamp(0.0, 1.0),
        }
    }

    /// Returns the embedding values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the embedding dimension.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Returns the quality score in `[0, 1]`.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Calculates the similarity to another embedding.
    ///
    /// Cosine similarity remapped from `[-1, 1]` to `[0, 1]` so that it
    /// composes with thresholds expressed as probabilities. Identical
    /// directions score 1.0, opposite directions 0.0. A zero-magnitude
    /// vector has no direction and scores 0.0 against anything.
    ///
    /// Reference: https://en.wikipedia.org/wiki/Cosine_similarity
    pub fn similarity(&self, other: &FaceEmbedding) -> f32 {
        let dot_product: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();

        let magnitude_self = self.values.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
        let magnitude_other = other.values.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();

        if magnitude_self == 0.0 || magnitude_other == 0.0 {
            return 0.0;
        }

        let cosine = dot_product / (magnitude_self * magnitude_other);
        ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

impl PartialEq for FaceEmbedding {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| (a - b).abs() < f32::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding_from(head: &[f32]) -> FaceEmbedding {
        let mut values = vec![0.0f32; DEFAULT_EMBEDDING_DIM];
        values[..head.len()].copy_from_slice(head);
        FaceEmbedding::new(values)
    }

    #[test]
    fn similarity_of_identical_is_one() {
        let e = embedding_from(&[0.3, 0.5, 0.7]);
        assert!((e.similarity(&e) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn similarity_of_opposite_is_zero() {
        let e = embedding_from(&[0.3, 0.5, 0.7]);
        let negated = FaceEmbedding::new(e.values().iter().map(|v| -v).collect());
        assert!(e.similarity(&negated).abs() < 1e-5);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = embedding_from(&[1.0, 0.0]);
        let b = embedding_from(&[0.6, 0.8]);
        assert!((a.similarity(&b) - b.similarity(&a)).abs() < 1e-6);
    }

    #[test]
    fn similarity_of_orthogonal_is_half() {
        let a = embedding_from(&[1.0, 0.0]);
        let b = embedding_from(&[0.0, 1.0]);
        assert!((a.similarity(&b) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn similarity_stays_within_unit_interval() {
        let a = embedding_from(&[0.9, -0.2, 0.1]);
        let b = embedding_from(&[-0.4, 0.8, -0.3]);
        let sim = a.similarity(&b);
        assert!((0.0..=1.0).contains(&sim));
    }

    #[test]
    fn zero_vector_scores_zero() {
        let zero = FaceEmbedding::new(vec![0.0; DEFAULT_EMBEDDING_DIM]);
        let e = embedding_from(&[1.0]);
        assert_eq!(zero.similarity(&e), 0.0);
    }

    #[test]
    fn quality_is_clamped() {
        let e = FaceEmbedding::with_quality(vec![1.0, 0.0], 1.7);
        assert_eq!(e.quality(), 1.0);
        let e = FaceEmbedding::with_quality(vec![1.0, 0.0], -0.3);
        assert_eq!(e.quality(), 0.0);
    }

    #[test]
    fn deserializes_without_a_quality_field() {
        let embedding: FaceEmbedding =
            serde_json::from_str(r#"{"values": [1.0, 0.0]}"#).unwrap();
        assert_eq!(embedding.quality(), 1.0);
    }
}
