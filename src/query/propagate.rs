//! Propagator (C10): spreading activation over the fragment graph, anchored
//! on one or more seed nodes, to surface relations beyond direct edges.
//!
//! Ported from `original_source/agent/propagacion.py`'s
//! `PropagadorActivacion` line-for-line in semantics: per-hop exponential
//! decay combined with a dynamic floor that tightens every step.

use crate::graph::FragmentGraph;
use crate::model::FragmentId;
use crate::weight;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct PropagationResult {
    pub activation: HashMap<FragmentId, f32>,
    pub depth: HashMap<FragmentId, u32>,
}

#[derive(Debug, Clone)]
pub struct MergedActivation {
    pub activation: f32,
    pub dominant_source: FragmentId,
    pub depth: u32,
}

pub struct Propagator<'a> {
    graph: &'a FragmentGraph,
    lambda_decay: f32,
    tau_act: f32,
    exclude_temporal: bool,
}

impl<'a> Propagator<'a> {
    pub fn new(graph: &'a FragmentGraph, lambda_decay: f32, tau_act: f32) -> Self {
        Self { graph, lambda_decay, tau_act, exclude_temporal: false }
    }

    /// `exclude_temporal(true)` drops edges whose temporal relevance exceeds
    /// 0.1 from propagation, keeping only near-purely-structural relations.
    /// Default is `false` — propagate along every edge above threshold.
    pub fn exclude_temporal(mut self, value: bool) -> Self {
        self.exclude_temporal = value;
        self
    }

    fn valid_neighbors(&self, node: &FragmentId) -> Vec<(FragmentId, f32)> {
        let mut out = Vec::new();
        for neighbor in self.graph.neighbors(node) {
            if &neighbor == node {
                continue;
            }
            let Some(edge) = self.graph.edge_data(node, &neighbor) else { continue };
            if self.exclude_temporal && edge.r_temp > 0.1 {
                continue;
            }
            if edge.w_eff >= self.tau_act {
                out.push((neighbor, edge.w_eff));
            }
        }
        out
    }

    /// Spread activation from `seed_id` up to `max_steps` hops (capped at
    /// 3, ADR-010 §2). Returns every reached node's final
    /// activation and the hop index (1-indexed) at which it first crossed
    /// the dynamic floor; the seed itself is excluded from the result.
    pub fn propagate_from(&self, seed_id: &FragmentId, a0: f32, max_steps: u32) -> PropagationResult {
        let max_steps = max_steps.min(3);
        if !self.graph.has_node(seed_id) {
            return PropagationResult::default();
        }

        let mut activations: HashMap<FragmentId, f32> = HashMap::new();
        activations.insert(seed_id.clone(), a0);
        let mut activations_by_step: Vec<HashMap<FragmentId, f32>> = vec![activations.clone()];

        for step in 0..max_steps {
            let mut new_activations: HashMap<FragmentId, f32> = HashMap::new();
            for (origin, &origin_activation) in activations.iter() {
                if origin_activation < self.tau_act {
                    continue;
                }
                for (neighbor, w_eff) in self.valid_neighbors(origin) {
                    if &neighbor == seed_id {
                        continue;
                    }
                    if let Some(propagated) = self.propagated_activation(origin_activation, w_eff, step) {
                        new_activations
                            .entry(neighbor)
                            .and_modify(|v| *v = v.max(propagated))
                            .or_insert(propagated);
                    }
                }
            }

            if new_activations.is_empty() {
                activations_by_step.push(activations.clone());
                break;
            }

            for (node, activation) in new_activations {
                if activation >= self.tau_act {
                    activations.entry(node).and_modify(|v| *v = v.max(activation)).or_insert(activation);
                }
            }
            activations_by_step.push(activations.clone());
        }

        let mut result = activations;
        result.remove(seed_id);

        let mut depth = HashMap::new();
        for node in result.keys() {
            let found = activations_by_step
                .iter()
                .enumerate()
                .find(|(_, step_map)| step_map.get(node).map(|a| *a >= self.tau_act).unwrap_or(false));
            depth.insert(node.clone(), found.map(|(idx, _)| idx as u32).unwrap_or(max_steps));
        }

        PropagationResult { activation: result, depth }
    }

    fn propagated_activation(&self, origin_activation: f32, w_eff: f32, step: u32) -> Option<f32> {
        let decay = self.lambda_decay.powi(step as i32 + 1);
        let propagated = origin_activation * w_eff * decay;
        let floor = self.tau_act * 1.5f32.powi(step as i32);
        if propagated < floor {
            None
        } else {
            Some(propagated.clamp(0.0, 1.0))
        }
    }

    /// Spread activation from multiple seeds (defaulting to C9's candidate
    /// output), merging by max activation across sources. Each seed's
    /// initial activation is the jaccard similarity of its keywords against
    /// the question's, floored at 0.3 and capped at 1.0.
    pub fn propagate_from_query(&self, question: &str, seeds: &[FragmentId], max_steps: u32) -> HashMap<FragmentId, MergedActivation> {
        let question_keywords = crate::keywords::extract_keywords(question);
        let mut merged: HashMap<FragmentId, MergedActivation> = HashMap::new();

        for seed in seeds {
            let Some(fragment) = self.graph.get_node(seed) else { continue };
            let a0 = weight::jaccard(&fragment.keywords, &question_keywords).clamp(0.3, 1.0);

            let result = self.propagate_from(seed, a0, max_steps);
            for (node, activation) in result.activation {
                let depth = result.depth.get(&node).copied().unwrap_or(0);
                merged
                    .entry(node)
                    .and_modify(|existing| {
                        if activation > existing.activation {
                            existing.activation = activation;
                            existing.dominant_source = seed.clone();
                            existing.depth = depth;
                        }
                    })
                    .or_insert(MergedActivation { activation, dominant_source: seed.clone(), depth });
            }
        }

        merged
    }

    /// BFS enumeration of every indirect path (length > 2, i.e. not a direct
    /// edge) between two nodes up to `max_length` hops. Ported from
    /// `encontrar_caminos_indirectos`; useful as a diagnostic alongside the
    /// main propagation result, not part of the propagation contract itself.
    pub fn find_indirect_paths(&self, source: &FragmentId, destination: &FragmentId, max_length: usize) -> Vec<Vec<FragmentId>> {
        if !self.graph.has_node(source) || !self.graph.has_node(destination) {
            return Vec::new();
        }

        let mut paths = Vec::new();
        let mut queue: VecDeque<Vec<FragmentId>> = VecDeque::new();
        queue.push_back(vec![source.clone()]);
        let mut seen_paths: HashSet<Vec<FragmentId>> = HashSet::new();

        while let Some(path) = queue.pop_front() {
            let current = path.last().unwrap().clone();

            if &current == destination && path.len() > 2 {
                paths.push(path);
                continue;
            }
            if path.len() >= max_length {
                continue;
            }

            for neighbor in self.graph.neighbors(&current) {
                if path.contains(&neighbor) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(neighbor);
                if seen_paths.insert(next_path.clone()) {
                    queue.push_back(next_path);
                }
            }
        }

        paths
    }

    /// Rank every node by the total activation its propagation reaches,
    /// descending. Ported from `analizar_centralidad_propagacion` as a
    /// cheap proxy for centrality that reuses the propagation machinery
    /// instead of a separate graph algorithm.
    pub fn centrality_ranking(&self, max_steps: u32) -> Vec<(FragmentId, f32)> {
        let mut scores: Vec<(FragmentId, f32)> = self
            .graph
            .node_ids()
            .into_iter()
            .map(|id| {
                let score: f32 = self.propagate_from(&id, 1.0, max_steps).activation.values().sum();
                (id, score)
            })
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContextType, ConversationId, Edge, Fragment};

    fn frag(conv: &ConversationId) -> Fragment {
        Fragment::new(conv.clone(), "t", "x")
    }

    #[test]
    fn chain_propagation_matches_scenario_s6() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        let b = frag(&conv);
        let c = frag(&conv);
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_node(c.clone());

        graph.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.6, 0.0, 0.6, (ContextType::General, ContextType::General), false));
        graph.add_edge_pair(Edge::new(b.id.clone(), c.id.clone(), 0.5, 0.0, 0.5, (ContextType::General, ContextType::General), false));

        let propagator = Propagator::new(&graph, 0.8, 0.1);
        let result = propagator.propagate_from(&a.id, 1.0, 2);

        let b_activation = result.activation[&b.id];
        assert!((b_activation - 0.48).abs() < 1e-5, "got {}", b_activation);
        assert_eq!(result.depth[&b.id], 1);

        let c_activation = result.activation[&c.id];
        assert!((c_activation - 0.1536).abs() < 1e-4, "got {}", c_activation);
        assert_eq!(result.depth[&c.id], 2);
    }

    #[test]
    fn higher_threshold_prunes_far_node() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        let b = frag(&conv);
        let c = frag(&conv);
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_node(c.clone());
        graph.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.6, 0.0, 0.6, (ContextType::General, ContextType::General), false));
        graph.add_edge_pair(Edge::new(b.id.clone(), c.id.clone(), 0.5, 0.0, 0.5, (ContextType::General, ContextType::General), false));

        let propagator = Propagator::new(&graph, 0.8, 0.2);
        let result = propagator.propagate_from(&a.id, 1.0, 2);
        assert!(!result.activation.contains_key(&c.id));
    }

    #[test]
    fn seed_is_excluded_from_result() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        let b = frag(&conv);
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.6, 0.0, 0.6, (ContextType::General, ContextType::General), false));

        let propagator = Propagator::new(&graph, 0.8, 0.1);
        let result = propagator.propagate_from(&a.id, 1.0, 1);
        assert!(!result.activation.contains_key(&a.id));
    }

    #[test]
    fn isolated_node_returns_empty_immediately() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        graph.add_node(a.clone());

        let propagator = Propagator::new(&graph, 0.8, 0.1);
        let result = propagator.propagate_from(&a.id, 1.0, 3);
        assert!(result.activation.is_empty());
    }

    #[test]
    fn find_indirect_paths_excludes_direct_edge() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        let b = frag(&conv);
        let c = frag(&conv);
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_node(c.clone());
        graph.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.6, 0.0, 0.6, (ContextType::General, ContextType::General), false));
        graph.add_edge_pair(Edge::new(b.id.clone(), c.id.clone(), 0.5, 0.0, 0.5, (ContextType::General, ContextType::General), false));
        graph.add_edge_pair(Edge::new(a.id.clone(), c.id.clone(), 0.6, 0.0, 0.6, (ContextType::General, ContextType::General), false));

        let propagator = Propagator::new(&graph, 0.8, 0.1);
        let paths = propagator.find_indirect_paths(&a.id, &c.id, 3);
        assert!(paths.iter().any(|p| p.len() == 3));
        assert!(paths.iter().all(|p| p.len() > 2));
    }

    #[test]
    fn centrality_ranking_orders_descending() {
        let graph = FragmentGraph::new();
        let conv = ConversationId::new();
        let a = frag(&conv);
        let b = frag(&conv);
        let c = frag(&conv);
        graph.add_node(a.clone());
        graph.add_node(b.clone());
        graph.add_node(c.clone());
        graph.add_edge_pair(Edge::new(a.id.clone(), b.id.clone(), 0.7, 0.0, 0.7, (ContextType::General, ContextType::General), false));

        let propagator = Propagator::new(&graph, 0.8, 0.1);
        let ranking = propagator.centrality_ranking(2);
        for pair in ranking.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }
}
