//! Domain Value Objects

mod bounding_box;
mod face_embedding;

pub use bounding_box::BoundingBox;
pub use face_embedding::{FaceEmbedding, DEFAULT_EMBEDDING_DIM};
