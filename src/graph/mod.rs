//! Fragment graph store (C5): an in-memory directed graph of fragment
//! nodes with weighted, bidirectional edges, and its on-disk snapshot.
//!
//! Nodes and adjacency live in `DashMap`s (teacher pattern,
//! `src/graph/engine.rs`'s `DashMap<ContextId, Context>`) so concurrent
//! reads never block each other; a single writer `Mutex<()>` serializes
//! mutation (`add_node`/`add_edge_pair`/`clear_edges`/snapshot save) the way
//! the teacher keeps one coarse writer discipline around fine-grained
//! concurrent reads.

mod snapshot;

pub use snapshot::{GraphSnapshot, LoadOutcome};

use crate::model::{Edge, Fragment, FragmentId};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("fragment not found: {0}")]
    NotFound(FragmentId),
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialization(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory fragment/edge store. `nodes` and `adjacency` are independently
/// concurrent; `writer` is acquired only around structural mutation, never
/// around reads (`neighbors`, `edge_data`, `node_count`, `edge_count`).
pub struct FragmentGraph {
    nodes: DashMap<FragmentId, Fragment>,
    adjacency: DashMap<FragmentId, DashMap<FragmentId, Edge>>,
    writer: Mutex<()>,
}

impl Default for FragmentGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentGraph {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            adjacency: DashMap::new(),
            writer: Mutex::new(()),
        }
    }

    /// Insert or replace a fragment node. Fragments are append-only at the
    /// API boundary (re-ingestion creates a new id); `add_node` itself
    /// allows replacement so snapshot loading can rebuild idempotently.
    pub fn add_node(&self, fragment: Fragment) {
        let _guard = self.writer.lock().unwrap();
        self.adjacency.entry(fragment.id.clone()).or_default();
        self.nodes.insert(fragment.id.clone(), fragment);
    }

    pub fn has_node(&self, id: &FragmentId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get_node(&self, id: &FragmentId) -> Option<Fragment> {
        self.nodes.get(id).map(|r| r.clone())
    }

    /// All node ids, in arbitrary (DashMap shard) order. Callers that need
    /// insertion order should track it themselves (see `ingest`).
    pub fn node_ids(&self) -> Vec<FragmentId> {
        self.nodes.iter().map(|r| r.key().clone()).collect()
    }

    pub fn all_nodes(&self) -> Vec<Fragment> {
        self.nodes.iter().map(|r| r.value().clone()).collect()
    }

    /// Materialize a single directed edge. Internal — callers go through
    /// `add_edge_pair` to uphold Invariant 1 (every edge's reverse twin
    /// exists with identical attributes).
    fn add_edge(&self, edge: Edge) {
        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.target.clone(), edge);
    }

    /// The only public edge-creation entry point: always materializes both
    /// directions of a semantic relation from one `Edge` (source → target);
    /// the reverse twin is derived via `Edge::reversed`.
    pub fn add_edge_pair(&self, edge: Edge) {
        let _guard = self.writer.lock().unwrap();
        let reverse = edge.reversed();
        self.add_edge(edge);
        self.add_edge(reverse);
    }

    pub fn clear_edges(&self) {
        let _guard = self.writer.lock().unwrap();
        for entry in self.adjacency.iter() {
            entry.value().clear();
        }
    }

    /// Wipe every node and edge. Used by the full data-reset facade
    /// operation; unlike `clear_edges`, nodes do not survive this call.
    pub fn clear_all(&self) {
        let _guard = self.writer.lock().unwrap();
        self.nodes.clear();
        self.adjacency.clear();
    }

    pub fn neighbors(&self, id: &FragmentId) -> Vec<FragmentId> {
        self.adjacency
            .get(id)
            .map(|m| m.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn edge_data(&self, src: &FragmentId, dst: &FragmentId) -> Option<Edge> {
        self.adjacency.get(src)?.get(dst).map(|e| e.clone())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Directed edge count (a bidirectional pair counts as 2, matching the
    /// original's `grafo_contextos.number_of_edges()` over a `DiGraph`).
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|m| m.len()).sum()
    }

    pub fn snapshot_save(&self, path_graph: &Path, path_metadata: &Path) -> GraphResult<()> {
        let _guard = self.writer.lock().unwrap();
        let snapshot = GraphSnapshot::capture(&self.nodes, &self.adjacency);
        snapshot.save(path_graph, path_metadata)
    }

    /// Rebuild the store from disk. On binary-dump corruption, falls back
    /// to the metadata file alone (nodes only, no edges) and reports that
    /// the caller must recompute edges (Error Handling §7).
    pub fn snapshot_load(&self, path_graph: &Path, path_metadata: &Path) -> GraphResult<LoadOutcome> {
        let _guard = self.writer.lock().unwrap();
        self.nodes.clear();
        self.adjacency.clear();

        let (fragments, edges, outcome) = GraphSnapshot::load(path_graph, path_metadata)?;
        for fragment in fragments {
            self.adjacency.entry(fragment.id.clone()).or_default();
            self.nodes.insert(fragment.id.clone(), fragment);
        }
        for edge in edges {
            self.add_edge(edge);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContextType, ConversationId};

    fn frag(conv: &ConversationId, text: &str) -> Fragment {
        Fragment::new(conv.clone(), "t", text)
    }

    #[test]
    fn add_edge_pair_materializes_both_directions_with_identical_attrs() {
        let g = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv, "a");
        let b = frag(&conv, "b");
        g.add_node(a.clone());
        g.add_node(b.clone());

        let edge = Edge::new(a.id.clone(), b.id.clone(), 0.7, 0.0, 0.4, (ContextType::General, ContextType::General), false);
        g.add_edge_pair(edge);

        let fwd = g.edge_data(&a.id, &b.id).unwrap();
        let back = g.edge_data(&b.id, &a.id).unwrap();
        assert_eq!(fwd.w_struct, back.w_struct);
        assert_eq!(fwd.w_eff, back.w_eff);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn clear_edges_empties_adjacency_but_keeps_nodes() {
        let g = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv, "a");
        let b = frag(&conv, "b");
        g.add_node(a.clone());
        g.add_node(b.clone());
        g.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.7, 0.0, 0.4, (ContextType::General, ContextType::General), false));

        g.clear_edges();
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn clear_all_empties_nodes_and_edges() {
        let g = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv, "a");
        let b = frag(&conv, "b");
        g.add_node(a.clone());
        g.add_node(b.clone());
        g.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.7, 0.0, 0.4, (ContextType::General, ContextType::General), false));

        g.clear_all();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn neighbors_reflects_both_directions() {
        let g = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv, "a");
        let b = frag(&conv, "b");
        g.add_node(a.clone());
        g.add_node(b.clone());
        g.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.7, 0.0, 0.4, (ContextType::General, ContextType::General), false));

        assert_eq!(g.neighbors(&a.id), vec![b.id.clone()]);
        assert_eq!(g.neighbors(&b.id), vec![a.id.clone()]);
    }
}
