//! Query tree builder (C11): a star-shaped scored graph rooted at a
//! synthetic question node, fanning out to the selected candidates, scored
//! by an intent-adaptive blend of structural and temporal signal.
//!
//! Ported from `original_source/agent/grafo.py`'s `construir_arbol_consulta`
//! — the node/edge tooltip shape and type-icon map carry forward for the UI
//! collaborator; the scoring formula itself is ADR-011's.

use super::analyzer::{Intent, Plan};
use crate::graph::FragmentGraph;
use crate::model::{ContextType, Fragment, FragmentId};
use crate::vector::VectorIndex;
use crate::weight;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct QueryTreeNode {
    pub id: String,
    pub label: String,
    pub context_type: Option<ContextType>,
    pub icon: &'static str,
    pub is_temporal: bool,
    pub is_pdf: bool,
}

#[derive(Debug, Clone)]
pub struct QueryTreeEdge {
    pub from: String,
    pub to: FragmentId,
    pub w_struct: f32,
    pub r_temp: f32,
    pub w_eff: f32,
}

#[derive(Debug, Clone)]
pub struct QueryTreeMeta {
    pub reference_timestamp: Option<NaiveDateTime>,
    pub moment_of_query: NaiveDateTime,
    pub processed_count: usize,
    pub question: String,
}

#[derive(Debug, Clone)]
pub struct QueryTree {
    pub nodes: Vec<QueryTreeNode>,
    pub edges: Vec<QueryTreeEdge>,
    pub meta: QueryTreeMeta,
}

const ROOT_ID: &str = "consulta";

fn question_icon() -> &'static str {
    "\u{2753}"
}

fn root_label(question: &str) -> String {
    if question.chars().count() > 50 {
        let truncated: String = question.chars().take(50).collect();
        format!("{} {}...", question_icon(), truncated)
    } else {
        format!("{} {}", question_icon(), question)
    }
}

fn node_label(fragment: &Fragment) -> String {
    let icon = fragment.context_type.icon();
    let title = &fragment.title;
    if title.chars().count() > 25 {
        let truncated: String = title.chars().take(25).collect();
        format!("{} {}...", icon, truncated)
    } else {
        format!("{} {}", icon, title)
    }
}

/// Build the scored subgraph for one question against its selected
/// candidates. Candidates missing from `graph` are silently skipped (a
/// stale id from a since-deleted fragment).
pub fn build_query_tree(
    graph: &FragmentGraph,
    vector_index: &VectorIndex,
    question: &str,
    candidates: &[FragmentId],
    plan: &Plan,
    now: NaiveDateTime,
) -> QueryTree {
    let question_keywords = crate::keywords::extract_keywords(question);
    let semantic_scores = vector_index.query_batch_against(question, candidates).unwrap_or_default();

    let root = QueryTreeNode {
        id: ROOT_ID.to_string(),
        label: root_label(question),
        context_type: None,
        icon: question_icon(),
        is_temporal: false,
        is_pdf: false,
    };

    let mut nodes = vec![root];
    let mut edges = Vec::new();
    let mut processed_count = 0usize;

    for id in candidates {
        let Some(fragment) = graph.get_node(id) else { continue };
        processed_count += 1;

        let jaccard_score = weight::jaccard(&question_keywords, &fragment.keywords);
        let semantic_score = semantic_scores.get(id).copied().unwrap_or(0.0);
        let ws = weight::structural_similarity(jaccard_score, semantic_score);

        let rt = weight::temporal_relevance(Some(now), fragment.timestamp, ContextType::General, fragment.context_type);

        let alpha = plan.temporal_factor;
        let raw_we = if plan.intent == Intent::Temporal && rt > 0.5 {
            rt * alpha * (1.0 + ws)
        } else {
            ws * (1.0 + rt * alpha)
        };
        let w_eff = raw_we / (1.0 + raw_we);

        nodes.push(QueryTreeNode {
            id: id.as_str().to_string(),
            label: node_label(&fragment),
            context_type: Some(fragment.context_type),
            icon: fragment.context_type.icon(),
            is_temporal: fragment.timestamp.is_some(),
            is_pdf: fragment.is_pdf_fragment,
        });
        edges.push(QueryTreeEdge { from: ROOT_ID.to_string(), to: id.clone(), w_struct: ws, r_temp: rt, w_eff });
    }

    edges.sort_by(|a, b| b.w_eff.partial_cmp(&a.w_eff).unwrap_or(std::cmp::Ordering::Equal));

    QueryTree {
        nodes,
        edges,
        meta: QueryTreeMeta { reference_timestamp: plan.reference_timestamp, moment_of_query: now, processed_count, question: question.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConversationId;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 22).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn seed(graph: &FragmentGraph, index: &VectorIndex, conv: &ConversationId, text: &str) -> FragmentId {
        let mut f = Fragment::new(conv.clone(), "titulo", text);
        f.keywords = crate::keywords::extract_keywords(text);
        let id = f.id.clone();
        index.upsert(&id, text).unwrap();
        graph.add_node(f);
        id
    }

    fn structural_plan() -> Plan {
        Plan { intent: Intent::Structural, confidence: 1.0, reference_timestamp: None, window: None, temporal_factor: 1.5, moment_of_query: now() }
    }

    #[test]
    fn edges_are_sorted_descending_by_w_eff() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let conv = ConversationId::new();
        let a = seed(&graph, &index, &conv, "presupuesto del proyecto alfa revision completa");
        let b = seed(&graph, &index, &conv, "vacaciones de verano del equipo");

        let tree = build_query_tree(&graph, &index, "presupuesto del proyecto alfa", &[a, b], &structural_plan(), now());
        assert_eq!(tree.nodes.len(), 3); // root + 2
        assert!(tree.edges[0].w_eff >= tree.edges[1].w_eff);
    }

    #[test]
    fn meta_carries_question_and_processed_count() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let conv = ConversationId::new();
        let a = seed(&graph, &index, &conv, "algo de contenido cualquiera");

        let tree = build_query_tree(&graph, &index, "pregunta de prueba", &[a], &structural_plan(), now());
        assert_eq!(tree.meta.processed_count, 1);
        assert_eq!(tree.meta.question, "pregunta de prueba");
    }

    #[test]
    fn w_eff_stays_normalized() {
        let graph = FragmentGraph::new();
        let index = VectorIndex::in_memory();
        let conv = ConversationId::new();
        let a = seed(&graph, &index, &conv, "reunion de presupuesto anual muy importante");

        let tree = build_query_tree(&graph, &index, "reunion de presupuesto anual muy importante", &[a], &structural_plan(), now());
        assert!(tree.edges[0].w_eff >= 0.0 && tree.edges[0].w_eff < 1.0);
    }
}
