//! Incremental updater (C7): edge formation on fragment add, full
//! recomputation, and de-duplication.
//!
//! Ported from `original_source/agent/grafo.py`'s
//! `_actualizar_relaciones_incremental` / `_recalcular_relaciones` /
//! `_calcular_similitud_textual_exacta`, in semantics rather than syntax:
//! one batched ANN query per fragment instead of per-pair embedding calls.

use crate::graph::FragmentGraph;
use crate::model::{Edge, Fragment, FragmentId, Parameters};
use crate::vector::VectorIndex;
use crate::weight;
use std::collections::BTreeSet;

/// Outcome of an ingest attempt: either a fresh node was added and edges
/// formed against the rest of the graph, or an existing node matched and
/// nothing was written.
#[derive(Debug)]
pub enum IngestOutcome {
    Added { id: FragmentId, edges_created: usize },
    Duplicate { existing_id: FragmentId },
}

/// Character-set Jaccard threshold above which two normalized texts longer
/// than 50 characters are treated as duplicates, ported from
/// `_calcular_similitud_textual_exacta`.
const DEDUP_CHAR_JACCARD_THRESHOLD: f32 = 0.98;
const DEDUP_MIN_LEN: usize = 50;

fn normalize_text(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_set_jaccard(a: &str, b: &str) -> f32 {
    let set_a: BTreeSet<char> = a.chars().collect();
    let set_b: BTreeSet<char> = b.chars().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Exact-match or near-duplicate check against every existing node, by
/// normalized text. Title is accepted for API symmetry with the rest of
/// the ingest path, but the original and this port both key the check on
/// text content.
pub fn find_duplicate(graph: &FragmentGraph, _title: &str, text: &str) -> Option<FragmentId> {
    let normalized = normalize_text(text);
    for fragment in graph.all_nodes() {
        let existing_normalized = normalize_text(&fragment.text);
        if existing_normalized == normalized {
            return Some(fragment.id);
        }
        if normalized.len() > DEDUP_MIN_LEN
            && existing_normalized.len() > DEDUP_MIN_LEN
            && char_set_jaccard(&normalized, &existing_normalized) > DEDUP_CHAR_JACCARD_THRESHOLD
        {
            return Some(fragment.id);
        }
    }
    None
}

/// Score one candidate pair into an `Edge`, given a pre-computed semantic
/// similarity (from a batched ANN query). Returns `None` if the pair falls
/// at or below `tau_sim`.
fn score_pair(a: &Fragment, b: &Fragment, semantic: f32, tau_sim: f32) -> Option<Edge> {
    let jaccard = weight::jaccard(&a.keywords, &b.keywords);
    let w_struct = weight::structural_similarity(jaccard, semantic);
    if w_struct <= tau_sim {
        return None;
    }
    let r_temp = weight::temporal_relevance(a.timestamp, b.timestamp, a.context_type, b.context_type);
    let w_eff = weight::compute_w_eff(w_struct, r_temp);
    let both_timestamped = a.timestamp.is_some() && b.timestamp.is_some();
    Some(Edge::new(a.id.clone(), b.id.clone(), w_struct, r_temp, w_eff, (a.context_type, b.context_type), both_timestamped))
}

/// Add one already-inserted fragment's edges against every other existing
/// node, via a single batched ANN query (ADR-007: `k = min(existing, 100)`;
/// any id the query doesn't return is treated as similarity 0).
pub fn add_fragment_edges(
    graph: &FragmentGraph,
    vector_index: &VectorIndex,
    new_id: &FragmentId,
    params: &Parameters,
) -> usize {
    let new_fragment = match graph.get_node(new_id) {
        Some(f) => f,
        None => return 0,
    };

    let existing_ids: Vec<FragmentId> =
        graph.node_ids().into_iter().filter(|id| id != new_id).collect();
    if existing_ids.is_empty() {
        return 0;
    }

    let similarities = vector_index
        .query_batch_against(&new_fragment.text, &existing_ids)
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "vector query failed during edge computation, falling back to jaccard-only");
            existing_ids.iter().map(|id| (id.clone(), 0.0)).collect()
        });

    let mut created = 0usize;
    for existing_id in &existing_ids {
        let Some(existing) = graph.get_node(existing_id) else { continue };
        let semantic = similarities.get(existing_id).copied().unwrap_or(0.0);
        if let Some(edge) = score_pair(&new_fragment, &existing, semantic, params.tau_sim) {
            graph.add_edge_pair(edge);
            created += 1;
        }
    }
    created
}

/// Validate-then-insert a single fragment: de-duplicate, insert the node,
/// index it in the vector store, and form its edges. Callers that already
/// know the fragment is new (batch ingest) should call the lower-level
/// pieces directly instead — see `ingest_conversation`.
pub fn ingest_fragment(
    graph: &FragmentGraph,
    vector_index: &VectorIndex,
    fragment: Fragment,
    params: &Parameters,
) -> Result<IngestOutcome, crate::vector::VectorIndexError> {
    if let Some(existing_id) = find_duplicate(graph, &fragment.title, &fragment.text) {
        return Ok(IngestOutcome::Duplicate { existing_id });
    }

    let id = fragment.id.clone();
    vector_index.upsert(&id, &fragment.text)?;
    graph.add_node(fragment);
    let edges_created = add_fragment_edges(graph, vector_index, &id, params);
    Ok(IngestOutcome::Added { id, edges_created })
}

/// Batch ingest a multi-fragment conversation: insert every node first,
/// one `upsert_batch` call to the vector index, then run the incremental
/// updater per fragment against the pre-existing graph — fragments of the
/// same conversation intentionally receive mutual edges through this loop
/// (ADR-007).
pub fn ingest_conversation(
    graph: &FragmentGraph,
    vector_index: &VectorIndex,
    fragments: Vec<Fragment>,
    params: &Parameters,
) -> Vec<IngestOutcome> {
    let mut to_insert = Vec::new();
    let mut outcomes = Vec::new();

    for fragment in fragments {
        if let Some(existing_id) = find_duplicate(graph, &fragment.title, &fragment.text) {
            outcomes.push(IngestOutcome::Duplicate { existing_id });
            continue;
        }
        to_insert.push(fragment);
    }

    if to_insert.is_empty() {
        return outcomes;
    }

    for fragment in &to_insert {
        graph.add_node(fragment.clone());
    }

    let ids: Vec<FragmentId> = to_insert.iter().map(|f| f.id.clone()).collect();
    let texts: Vec<&str> = to_insert.iter().map(|f| f.text.as_str()).collect();
    if let Err(err) = vector_index.upsert_batch(&ids, &texts) {
        tracing::warn!(error = %err, "batch embedding ultimately failed for this conversation");
    }

    for id in &ids {
        let edges_created = add_fragment_edges(graph, vector_index, id, params);
        outcomes.push(IngestOutcome::Added { id: id.clone(), edges_created });
    }

    outcomes
}

/// Full edge recomputation, driven by node insertion order so progress is
/// reproducible. Clears every edge first, then for each node issues one
/// batched ANN query against all *later* nodes — matching the original's
/// `_recalcular_relaciones` pairwise-without-double-counting structure,
/// logged per batch instead of printed.
pub fn recompute_all(graph: &FragmentGraph, vector_index: &VectorIndex, params: &Parameters) -> usize {
    graph.clear_edges();
    let mut ids = graph.node_ids();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    const BATCH_SIZE: usize = 10;
    let total = ids.len();
    let mut pairs_created = 0usize;

    for (batch_start, batch) in ids.chunks(BATCH_SIZE).enumerate() {
        for (offset, source_id) in batch.iter().enumerate() {
            let global_idx = batch_start * BATCH_SIZE + offset;
            let Some(source) = graph.get_node(source_id) else { continue };
            let remaining = &ids[global_idx + 1..];
            if remaining.is_empty() {
                continue;
            }

            let similarities = vector_index.query_batch_against(&source.text, remaining).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "vector query failed during recompute, falling back to jaccard-only");
                remaining.iter().map(|id| (id.clone(), 0.0)).collect()
            });

            for target_id in remaining {
                let Some(target) = graph.get_node(target_id) else { continue };
                let semantic = similarities.get(target_id).copied().unwrap_or(0.0);
                if let Some(edge) = score_pair(&source, &target, semantic, params.tau_sim) {
                    graph.add_edge_pair(edge);
                    pairs_created += 1;
                }
            }
        }
        tracing::info!(processed = ((batch_start + 1) * BATCH_SIZE).min(total), total, pairs_created, "recompute_all progress");
    }

    pairs_created
}

/// Used when a snapshot loads with only metadata (binary dump corrupt):
/// rebuild edges for every loaded conversation's node set in one pass, by
/// simply delegating to `recompute_all` over the whole graph.
pub fn rebuild_after_metadata_only_load(graph: &FragmentGraph, vector_index: &VectorIndex, params: &Parameters) {
    for fragment in graph.all_nodes() {
        let _ = vector_index.upsert(&fragment.id, &fragment.text);
    }
    recompute_all(graph, vector_index, params);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConversationId;

    fn fragment(conv: &ConversationId, title: &str, text: &str) -> Fragment {
        let mut f = Fragment::new(conv.clone(), title, text);
        f.keywords = crate::keywords::extract_keywords(text);
        f
    }

    #[test]
    fn ingest_fragment_creates_node_with_no_edges_when_alone() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let params = Parameters::default();
        let conv = ConversationId::new();

        let outcome = ingest_fragment(&graph, &index, fragment(&conv, "t", "reunion de presupuesto anual muy importante"), &params).unwrap();
        match outcome {
            IngestOutcome::Added { edges_created, .. } => assert_eq!(edges_created, 0),
            _ => panic!("expected Added"),
        }
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn duplicate_text_is_detected_and_not_reinserted() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let params = Parameters::default();
        let conv = ConversationId::new();

        let text = "reunion de arranque ana y beto acuerdan empezar el lunes";
        ingest_fragment(&graph, &index, fragment(&conv, "t", text), &params).unwrap();
        let second = ingest_fragment(&graph, &index, fragment(&conv, "t", text), &params).unwrap();

        match second {
            IngestOutcome::Duplicate { .. } => {}
            _ => panic!("expected Duplicate"),
        }
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn similar_fragments_in_same_conversation_get_mutual_edges() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let params = Parameters::default().with_tau_sim(0.1);
        let conv = ConversationId::new();

        let fragments = vec![
            fragment(&conv, "t", "el proyecto presupuesto anual avanza bien con buenos resultados"),
            fragment(&conv, "t", "el proyecto presupuesto anual tiene buenos resultados este trimestre"),
        ];
        let outcomes = ingest_conversation(&graph, &index, fragments, &params);
        assert_eq!(outcomes.len(), 2);
        assert!(graph.edge_count() >= 2, "expected at least one bidirectional edge pair");
    }

    #[test]
    fn recompute_all_reproduces_incremental_edge_count() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let params = Parameters::default().with_tau_sim(0.1);
        let conv = ConversationId::new();

        let fragments = vec![
            fragment(&conv, "t", "presupuesto anual del proyecto alfa revision completa"),
            fragment(&conv, "t", "presupuesto anual del proyecto alfa revision final"),
            fragment(&conv, "t", "reunion de equipo sobre vacaciones de verano"),
        ];
        ingest_conversation(&graph, &index, fragments, &params);
        let before = graph.edge_count();

        let after_pairs = recompute_all(&graph, &index, &params);
        assert_eq!(graph.edge_count(), before);
        assert_eq!(after_pairs * 2, before);
    }

    #[test]
    fn score_pair_rejects_below_threshold() {
        let conv = ConversationId::new();
        let a = fragment(&conv, "t", "algo sin relacion alguna");
        let b = fragment(&conv, "t", "otro tema completamente distinto");
        assert!(score_pair(&a, &b, 0.0, 0.5).is_none());
    }
}
