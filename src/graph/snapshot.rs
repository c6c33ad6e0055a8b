//! Atomic graph persistence: a binary adjacency dump plus a human-readable
//! JSON metadata file, written temp-then-rename (teacher idiom referenced
//! from `src/storage/sqlite.rs`'s durability discipline).

use super::GraphError;
use crate::model::{Edge, Fragment, FragmentId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Whether the loaded snapshot came from the binary dump intact, or had to
/// fall back to the metadata file (caller must recompute edges in the
/// latter case — Error Handling §7, "Corrupt binary snapshot at load").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Full,
    MetadataOnlyNeedsRecompute,
    Empty,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    nodes: Vec<Fragment>,
    edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn capture(
        nodes: &DashMap<FragmentId, Fragment>,
        adjacency: &DashMap<FragmentId, DashMap<FragmentId, Edge>>,
    ) -> Self {
        let nodes: Vec<Fragment> = nodes.iter().map(|r| r.value().clone()).collect();
        let edges: Vec<Edge> = adjacency
            .iter()
            .flat_map(|m| m.value().iter().map(|e| e.value().clone()).collect::<Vec<_>>())
            .collect();
        Self { nodes, edges }
    }

    pub fn save(&self, path_graph: &Path, path_metadata: &Path) -> Result<(), GraphError> {
        if let Some(parent) = path_graph.parent() {
            fs::create_dir_all(parent)?;
        }

        let binary = bincode::serialize(self).map_err(|e| GraphError::Serialization(e.to_string()))?;
        write_atomic(path_graph, &binary)?;

        let metadata: HashMap<&FragmentId, &Fragment> =
            self.nodes.iter().map(|f| (&f.id, f)).collect();
        let json = serde_json::to_vec_pretty(&metadata).map_err(|e| GraphError::Serialization(e.to_string()))?;
        write_atomic(path_metadata, &json)?;

        Ok(())
    }

    /// Try the binary dump first; on any deserialization failure, fall back
    /// to the metadata file (nodes only — edges must be recomputed by the
    /// caller). If neither file exists, start empty.
    pub fn load(
        path_graph: &Path,
        path_metadata: &Path,
    ) -> Result<(Vec<Fragment>, Vec<Edge>, LoadOutcome), GraphError> {
        if let Ok(bytes) = fs::read(path_graph) {
            if let Ok(snapshot) = bincode::deserialize::<GraphSnapshot>(&bytes) {
                return Ok((snapshot.nodes, snapshot.edges, LoadOutcome::Full));
            }
            tracing::warn!("graph snapshot binary dump is corrupt, falling back to metadata");
        }

        if let Ok(bytes) = fs::read(path_metadata) {
            let metadata: HashMap<FragmentId, Fragment> =
                serde_json::from_slice(&bytes).map_err(|e| GraphError::Serialization(e.to_string()))?;
            let nodes: Vec<Fragment> = metadata.into_values().collect();
            return Ok((nodes, Vec::new(), LoadOutcome::MetadataOnlyNeedsRecompute));
        }

        Ok((Vec::new(), Vec::new(), LoadOutcome::Empty))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContextType, ConversationId};
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips_nodes_and_edges() {
        let dir = tempdir().unwrap();
        let path_graph = dir.path().join("graph.bin");
        let path_metadata = dir.path().join("meta.json");

        let conv = ConversationId::new();
        let a = Fragment::new(conv.clone(), "t", "texto uno");
        let b = Fragment::new(conv.clone(), "t", "texto dos");
        let edge = Edge::new(a.id.clone(), b.id.clone(), 0.6, 0.0, 0.3, (ContextType::General, ContextType::General), false);

        let snapshot = GraphSnapshot { nodes: vec![a.clone(), b.clone()], edges: vec![edge.clone()] };
        snapshot.save(&path_graph, &path_metadata).unwrap();

        let (nodes, edges, outcome) = GraphSnapshot::load(&path_graph, &path_metadata).unwrap();
        assert_eq!(outcome, LoadOutcome::Full);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn corrupt_binary_falls_back_to_metadata() {
        let dir = tempdir().unwrap();
        let path_graph = dir.path().join("graph.bin");
        let path_metadata = dir.path().join("meta.json");

        let conv = ConversationId::new();
        let a = Fragment::new(conv, "t", "texto uno");
        let snapshot = GraphSnapshot { nodes: vec![a], edges: vec![] };
        snapshot.save(&path_graph, &path_metadata).unwrap();

        fs::write(&path_graph, b"not a valid bincode dump").unwrap();

        let (nodes, edges, outcome) = GraphSnapshot::load(&path_graph, &path_metadata).unwrap();
        assert_eq!(outcome, LoadOutcome::MetadataOnlyNeedsRecompute);
        assert_eq!(nodes.len(), 1);
        assert!(edges.is_empty());
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let (nodes, edges, outcome) =
            GraphSnapshot::load(&dir.path().join("none.bin"), &dir.path().join("none.json")).unwrap();
        assert_eq!(outcome, LoadOutcome::Empty);
        assert!(nodes.is_empty());
        assert!(edges.is_empty());
    }
}
