//! SqliteVecStore — persistent vector storage via sqlite-vec.
//!
//! Implements `VectorStore` with a sqlite-vec virtual table for KNN search.
//! Grounded on the teacher's `src/storage/sqlite_vec.rs`; PCG drops that
//! file's `context_id` partition key since there is a single flat fragment
//! pool (no multi-tenancy, a declared Non-goal) rather than per-context
//! isolation.
//!
//! Vectors are L2-normalized on insert so sqlite-vec's L2 distance converts
//! to cosine distance directly: for unit vectors, `L2² = 2(1 - cos_sim)`, so
//! `cos_sim = 1 - L2²/2` and cosine distance `d = 1 - cos_sim = L2²/2`.

use super::{VectorIndexError, VectorStore};
use crate::model::FragmentId;
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Mutex;

/// Spec-mandated embedding dimensionality.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Persistent vector store backed by sqlite-vec.
pub struct SqliteVecStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

fn register_vec_extension() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

impl SqliteVecStore {
    /// Open a persistent vector store at the given path.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, VectorIndexError> {
        register_vec_extension();
        let conn = Connection::open(path).map_err(|e| VectorIndexError::Store(e.to_string()))?;
        Self::init_connection(conn, dimensions)
    }

    /// Open an in-memory vector store (for tests).
    pub fn open_in_memory(dimensions: usize) -> Result<Self, VectorIndexError> {
        register_vec_extension();
        let conn =
            Connection::open_in_memory().map_err(|e| VectorIndexError::Store(e.to_string()))?;
        Self::init_connection(conn, dimensions)
    }

    fn init_connection(conn: Connection, dimensions: usize) -> Result<Self, VectorIndexError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| VectorIndexError::Store(e.to_string()))?;

        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_fragments USING vec0(\
                 fragment_id TEXT PRIMARY KEY,\
                 embedding float[{}]\
             )",
            dimensions
        );
        conn.execute_batch(&create_sql)
            .map_err(|e| VectorIndexError::Store(e.to_string()))?;

        Ok(Self { conn: Mutex::new(conn), dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl VectorStore for SqliteVecStore {
    fn put(&self, id: &FragmentId, vector: Vec<f32>) {
        let mut normalized = vector;
        l2_normalize(&mut normalized);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized);
        conn.execute(
            "INSERT OR REPLACE INTO vec_fragments(fragment_id, embedding) VALUES (?1, ?2)",
            rusqlite::params![id.as_str(), bytes],
        )
        .expect("vec_fragments insert failed");
    }

    fn has(&self, id: &FragmentId) -> bool {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vec_fragments WHERE fragment_id = ?1",
                rusqlite::params![id.as_str()],
                |row| row.get(0),
            )
            .unwrap_or(0);
        count > 0
    }

    fn knn(&self, query: &[f32], k: usize) -> Vec<(FragmentId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut normalized_query = query.to_vec();
        l2_normalize(&mut normalized_query);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized_query);

        let mut stmt = conn
            .prepare(
                "SELECT fragment_id, distance FROM vec_fragments \
                 WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
            )
            .expect("vec_fragments knn prepare failed");

        stmt.query_map(rusqlite::params![bytes, k as i64], |row| {
            let fid: String = row.get(0)?;
            let l2_distance: f32 = row.get(1)?;
            Ok((fid, l2_distance))
        })
        .expect("vec_fragments knn query failed")
        .filter_map(|r| r.ok())
        .map(|(fid, l2)| {
            // l2 distance between unit vectors: L2^2 = 2*(1 - cos_sim) = 2*cos_distance
            let cosine_distance = (l2 * l2) / 2.0;
            (FragmentId::from_string(fid), cosine_distance)
        })
        .collect()
    }

    fn remove(&self, ids: &[FragmentId]) {
        let conn = self.conn.lock().unwrap();
        for id in ids {
            let _ = conn.execute(
                "DELETE FROM vec_fragments WHERE fragment_id = ?1",
                rusqlite::params![id.as_str()],
            );
        }
    }

    fn count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM vec_fragments", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    fn reset(&self) {
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute("DELETE FROM vec_fragments", []);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_has_round_trip() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        let id = FragmentId::from_string("frag-a");
        assert!(!store.has(&id));
        store.put(&id, vec![0.9, 0.3, 0.1]);
        assert!(store.has(&id));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn knn_orders_by_distance() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        store.put(&FragmentId::from_string("a"), vec![0.9, 0.3, 0.1]);
        store.put(&FragmentId::from_string("b"), vec![0.85, 0.35, 0.15]);
        store.put(&FragmentId::from_string("c"), vec![0.1, 0.2, 0.95]);

        let hits = store.knn(&[0.9, 0.3, 0.1], 3);
        assert_eq!(hits[0].0, FragmentId::from_string("a"));
        assert!(hits[0].1 < hits[2].1);
    }

    #[test]
    fn remove_and_reset() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        let id = FragmentId::from_string("a");
        store.put(&id, vec![0.1, 0.2, 0.3]);
        store.remove(&[id.clone()]);
        assert!(!store.has(&id));

        store.put(&FragmentId::from_string("b"), vec![0.4, 0.5, 0.6]);
        store.reset();
        assert_eq!(store.count(), 0);
    }
}
