//! Embedder implementations.
//!
//! `MockEmbedder` is a deterministic hash-based stand-in used by tests and
//! by any build without the `embeddings` feature; `FastEmbedEmbedder` is the
//! production backend, grounded on the teacher's
//! `src/adapter/embedding.rs::fastembed_impl`.

use super::{Embedder, VectorIndexError, EMBEDDING_DIMENSIONS};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic, dependency-free embedder: hashes overlapping word shingles
/// into a fixed-width vector and L2-normalizes it. Not semantically
/// meaningful beyond "similar bags of words map to similar vectors" — good
/// enough to exercise the query/edge-weight pipeline in tests without an
/// ONNX runtime.
pub struct MockEmbedder {
    dimensions: usize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: EMBEDDING_DIMENSIONS }
    }
}

impl MockEmbedder {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();
        for token in lower.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dimensions;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorIndexError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, VectorIndexError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while `Embedder` uses `&self` (teacher
    /// idiom, `src/adapter/embedding.rs::FastEmbedEmbedder`).
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, VectorIndexError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| VectorIndexError::Embedding(e.to_string()))?;
            Ok(Self { model: Mutex::new(embedding) })
        }

        /// Default model: a 384-dim sentence embedding model, matching the
        /// engine's required dimensionality (ADR-005; the teacher defaults
        /// to the 768-dim `NomicEmbedTextV15`, see DESIGN.md).
        pub fn default_model() -> Result<Self, VectorIndexError> {
            Self::new(EmbeddingModel::BGESmallENV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorIndexError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| VectorIndexError::Embedding(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(VectorIndexError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_embedder_is_deterministic() {
        let e = MockEmbedder::with_dimensions(32);
        let a = e.embed_batch(&["hola mundo"]).unwrap();
        let b = e.embed_batch(&["hola mundo"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mock_embedder_produces_requested_dimension() {
        let e = MockEmbedder::with_dimensions(16);
        let v = e.embed_batch(&["algo"]).unwrap();
        assert_eq!(v[0].len(), 16);
    }
}
