//! Dense vector index (C3): a persistent approximate-nearest-neighbor store
//! over fixed-dimension embeddings, integrated with the graph.
//!
//! Split into an `Embedder` (text -> vector) and a `VectorStore` (vector
//! storage + KNN) exactly as the teacher's embedding-similarity enrichment
//! does (`src/adapter/embedding.rs`); unlike the teacher, which scopes
//! vectors per-context, PCG has a single flat fragment pool (no
//! multi-tenancy, a declared Non-goal), so the store is unscoped.
//!
//! The index must expose embeddings explicitly — callers always go through
//! `VectorIndex`, which owns both the embedder and the store, so `upsert`
//! and `query` are guaranteed to use the identical encoder.

mod embedder;
#[cfg(feature = "embeddings")]
pub mod sqlite_vec;

pub use embedder::MockEmbedder;
#[cfg(feature = "embeddings")]
pub use embedder::FastEmbedEmbedder;
#[cfg(feature = "embeddings")]
pub use sqlite_vec::{SqliteVecStore, DEFAULT_EMBEDDING_DIMENSIONS};

use crate::model::FragmentId;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;

/// Spec-mandated embedding dimensionality (cosine metric).
pub const EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("embedding model error: {0}")]
    Embedding(String),
    #[error("embedding returned no results")]
    EmptyResult,
    #[error("vector store error: {0}")]
    Store(String),
}

/// Text -> dense vector. Implementations own model loading/inference.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorIndexError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, VectorIndexError> {
        let mut v = self.embed_batch(&[text])?;
        v.pop().ok_or(VectorIndexError::EmptyResult)
    }
}

/// Storage + KNN search over already-computed embedding vectors.
///
/// Implementations range from `InMemoryVectorStore` (brute-force cosine
/// scan, always available) to `SqliteVecStore` (persistent, behind the
/// `embeddings` feature).
pub trait VectorStore: Send + Sync {
    fn put(&self, id: &FragmentId, vector: Vec<f32>);
    fn has(&self, id: &FragmentId) -> bool;
    /// Top-`k` nearest neighbors by ascending cosine distance.
    fn knn(&self, query: &[f32], k: usize) -> Vec<(FragmentId, f32)>;
    fn remove(&self, ids: &[FragmentId]);
    fn count(&self) -> usize;
    fn reset(&self);
}

/// Cosine distance in `[0, 2]`. `0` for identical direction, `2` for
/// opposite. Callers convert to a similarity score via
/// `weight::cosine_distance_to_similarity`.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    let cos_sim = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - cos_sim
}

/// Brute-force in-memory `VectorStore`. The default for tests and for
/// builds without the `embeddings` feature.
#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<FragmentId, Vec<f32>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn put(&self, id: &FragmentId, vector: Vec<f32>) {
        self.vectors.write().unwrap().insert(id.clone(), vector);
    }

    fn has(&self, id: &FragmentId) -> bool {
        self.vectors.read().unwrap().contains_key(id)
    }

    fn knn(&self, query: &[f32], k: usize) -> Vec<(FragmentId, f32)> {
        let store = self.vectors.read().unwrap();
        let mut scored: Vec<(FragmentId, f32)> = store
            .iter()
            .map(|(id, v)| (id.clone(), cosine_distance(query, v)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn remove(&self, ids: &[FragmentId]) {
        let mut store = self.vectors.write().unwrap();
        for id in ids {
            store.remove(id);
        }
    }

    fn count(&self) -> usize {
        self.vectors.read().unwrap().len()
    }

    fn reset(&self) {
        self.vectors.write().unwrap().clear();
    }
}

/// The C3 facade: couples an `Embedder` with a `VectorStore` so a caller
/// never has to worry about model/encoder drift between index time and
/// query time.
pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    store: Box<dyn VectorStore>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("count", &self.store.count())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(embedder: Box<dyn Embedder>, store: Box<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// In-memory index backed by `MockEmbedder`, for tests and offline use.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MockEmbedder::default()), Box::new(InMemoryVectorStore::new()))
    }

    pub fn upsert(&self, id: &FragmentId, text: &str) -> Result<(), VectorIndexError> {
        let vector = self.embedder.embed_one(text)?;
        self.store.put(id, vector);
        Ok(())
    }

    /// Amortized batch upsert. Falls back to single-item upserts on a
    /// batch embedding failure (Error Handling §7), so a transient batch
    /// failure doesn't fail an entire conversation's ingest.
    pub fn upsert_batch(&self, ids: &[FragmentId], texts: &[&str]) -> Result<(), VectorIndexError> {
        if ids.len() != texts.len() {
            return Err(VectorIndexError::Store(
                "ids and texts length mismatch".into(),
            ));
        }
        match self.embedder.embed_batch(texts) {
            Ok(vectors) => {
                for (id, vector) in ids.iter().zip(vectors.into_iter()) {
                    self.store.put(id, vector);
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "batch embedding failed, retrying as single upserts");
                for (id, text) in ids.iter().zip(texts.iter()) {
                    self.upsert(id, text)?;
                }
                Ok(())
            }
        }
    }

    /// Top-`k` nearest neighbors, with cosine distance converted to
    /// the engine's `s = max(0, 1 - d/2)` similarity (ADR-006).
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<(FragmentId, f32)>, VectorIndexError> {
        let vector = self.embedder.embed_one(text)?;
        Ok(self
            .store
            .knn(&vector, k)
            .into_iter()
            .map(|(id, distance)| (id, crate::weight::cosine_distance_to_similarity(distance)))
            .collect())
    }

    /// Similarities of `text` against a known id set, implemented as a
    /// wide KNN query intersected with `candidate_ids`.
    pub fn query_batch_against(
        &self,
        text: &str,
        candidate_ids: &[FragmentId],
    ) -> Result<HashMap<FragmentId, f32>, VectorIndexError> {
        let k = self.store.count().max(candidate_ids.len()).max(1);
        let hits = self.query(text, k)?;
        let lookup: HashMap<FragmentId, f32> = hits.into_iter().collect();
        Ok(candidate_ids
            .iter()
            .map(|id| (id.clone(), lookup.get(id).copied().unwrap_or(0.0)))
            .collect())
    }

    pub fn delete(&self, ids: &[FragmentId]) {
        self.store.remove(ids);
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_retrieval_sanity_check() {
        let index = VectorIndex::in_memory();
        let id = FragmentId::from_string("frag-1");
        index.upsert(&id, "reunion de presupuesto anual").unwrap();

        let hits = index.query("reunion de presupuesto anual", 1).unwrap();
        assert_eq!(hits[0].0, id);
        assert!(hits[0].1 > 0.999, "self similarity should be ~1.0, got {}", hits[0].1);
    }

    #[test]
    fn upsert_batch_then_query_batch_against() {
        let index = VectorIndex::in_memory();
        let ids = vec![
            FragmentId::from_string("a"),
            FragmentId::from_string("b"),
            FragmentId::from_string("c"),
        ];
        let texts = vec!["uno dos tres", "cuatro cinco seis", "siete ocho nueve"];
        index.upsert_batch(&ids, &texts).unwrap();
        assert_eq!(index.count(), 3);

        let sims = index.query_batch_against("uno dos tres", &ids).unwrap();
        assert_eq!(sims.len(), 3);
        assert!(sims[&ids[0]] >= sims[&ids[1]]);
    }

    #[test]
    fn delete_and_reset() {
        let index = VectorIndex::in_memory();
        let id = FragmentId::from_string("x");
        index.upsert(&id, "algo de texto").unwrap();
        assert_eq!(index.count(), 1);
        index.delete(&[id]);
        assert_eq!(index.count(), 0);

        index.upsert(&FragmentId::from_string("y"), "mas texto").unwrap();
        index.reset();
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn cosine_distance_self_is_near_zero() {
        let v = vec![0.3, 0.4, 0.5];
        assert!(cosine_distance(&v, &v) < 1e-5);
    }

    #[test]
    fn cosine_distance_orthogonal_is_one() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    }
}
