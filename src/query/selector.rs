//! Candidate selector (C9): turns a question plus a C8 plan into an
//! ordered candidate set, applying temporal-window filtering with the
//! three-step fallback chain from ADR-009.

use super::analyzer::{Plan, Window};
use crate::graph::FragmentGraph;
use crate::model::{Fragment, FragmentId};
use crate::vector::VectorIndex;

/// Which tier of the fallback chain actually produced `SelectionResult::candidates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// No window in the plan: unfiltered semantic top-K.
    SemanticOnly,
    /// ANN top-3K had enough in-window hits.
    WindowFiltered,
    /// Fallback (a): full graph scan for window membership.
    FullScanWindow,
    /// Fallback (b): closest-by-timestamp to the query moment.
    ClosestByTime,
    /// Fallback (c): window requested but nothing in the graph is timestamped.
    UnfilteredFallback,
}

#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub candidates: Vec<FragmentId>,
    pub filtered_out_count: usize,
    pub strategy: SelectionStrategy,
}

fn in_window(fragment: &Fragment, window: &Window) -> bool {
    match fragment.timestamp {
        Some(ts) => ts >= window.start && ts <= window.end,
        None => false,
    }
}

/// Select up to `k` candidates for `question`, honoring `plan`'s temporal
/// window if present.
pub fn select(graph: &FragmentGraph, vector_index: &VectorIndex, question: &str, plan: &Plan, k: usize) -> SelectionResult {
    let semantic_top_3k = vector_index
        .query(question, k * 3)
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "vector query failed during candidate selection");
            Vec::new()
        });
    let semantic_ids: Vec<FragmentId> = semantic_top_3k.into_iter().map(|(id, _)| id).collect();

    let Some(window) = plan.window else {
        let top_k: Vec<FragmentId> = semantic_ids.into_iter().take(k).collect();
        return SelectionResult { candidates: top_k, filtered_out_count: 0, strategy: SelectionStrategy::SemanticOnly };
    };

    let mut in_window_candidates = Vec::new();
    let mut out_of_window_count = 0usize;
    for id in &semantic_ids {
        match graph.get_node(id) {
            Some(fragment) if in_window(&fragment, &window) => in_window_candidates.push(id.clone()),
            Some(_) => out_of_window_count += 1,
            None => {}
        }
    }

    if !in_window_candidates.is_empty() {
        in_window_candidates.truncate(k);
        return SelectionResult {
            candidates: in_window_candidates,
            filtered_out_count: out_of_window_count,
            strategy: SelectionStrategy::WindowFiltered,
        };
    }

    // Fallback (a): scan every fragment, not just the ANN top-3K, for window membership.
    let mut full_scan: Vec<Fragment> = graph.all_nodes().into_iter().filter(|f| in_window(f, &window)).collect();
    if !full_scan.is_empty() {
        full_scan.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let candidates = full_scan.into_iter().take(k).map(|f| f.id).collect();
        return SelectionResult { candidates, filtered_out_count: out_of_window_count, strategy: SelectionStrategy::FullScanWindow };
    }

    // Fallback (b): sort every timestamped fragment by |ts - now|, closest first.
    let now = plan.moment_of_query;
    let mut timestamped: Vec<Fragment> = graph.all_nodes().into_iter().filter(|f| f.timestamp.is_some()).collect();
    if !timestamped.is_empty() {
        timestamped.sort_by_key(|f| (f.timestamp.unwrap() - now).num_seconds().unsigned_abs());
        let candidates = timestamped.into_iter().take(k).map(|f| f.id).collect();
        return SelectionResult { candidates, filtered_out_count: out_of_window_count, strategy: SelectionStrategy::ClosestByTime };
    }

    // Fallback (c): no fragment has a timestamp at all, return the unfiltered semantic top-K.
    let candidates = semantic_ids.into_iter().take(k).collect();
    SelectionResult { candidates, filtered_out_count: out_of_window_count, strategy: SelectionStrategy::UnfilteredFallback }
}
