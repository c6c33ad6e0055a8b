//! Engine facade (teacher idiom, ADR-014-style single entry point):
//! `Engine` is the one consumer-facing type. An HTTP layer or the `mcp`
//! module calls `Engine` methods only — they never reach into
//! `FragmentGraph`, `VectorIndex`, or the query modules directly.
//!
//! Grounded on `src/graph/engine.rs`'s `PlexusEngine` as the model for a
//! single top-level type owning every subsystem; the operation list itself
//! is ADR-004's HTTP surface, translated one-for-one into library methods
//! so a thin transport layer can serialize the DTOs below.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::fragment::{self, FragmentInput};
use crate::graph::{FragmentGraph, GraphError, LoadOutcome};
use crate::ingest::{self, IngestOutcome};
use crate::model::{ContextType, ConversationId, ConversationRecord, Fragment, FragmentId, Parameters};
use crate::query::{self, Intent, Plan, Propagator, QueryAnalyzer, RuleBasedAnalyzer, SelectionResult, SelectionStrategy};
use crate::temporal;
use crate::vector::{VectorIndex, VectorIndexError};

/// Sentinel `fecha` value meaning "this conversation has no date" — kept
/// distinct from an absent field so a caller can be explicit about it
/// (ADR-004's `POST /agregar_conversacion_con_pdf`).
pub const ATEMPORAL_SENTINEL: &str = "ATEMPORAL";

const DEFAULT_MAX_WORDS: usize = 300;
const DEFAULT_MIN_WORDS: usize = 50;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("empty ingest: no fragments produced")]
    EmptyIngest,
    #[error(transparent)]
    Vector(#[from] VectorIndexError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Request shape for a single conversation ingest (the fragmenter's
/// `FragmentInput` plus the conversation-level fields a collaborator
/// supplies — title, date, participants, an optional free-form metadata
/// payload, and an optional already-extracted document attachment).
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub title: String,
    pub text: String,
    /// `None` = atemporal; `Some(date_string)` is parsed via
    /// `temporal::parse_iso_datetime_safe` (the `ATEMPORAL_SENTINEL` string
    /// is treated identically to `None`).
    pub fecha: Option<String>,
    pub participants: Vec<String>,
    pub metadata: serde_json::Value,
    pub document_origin: Option<crate::model::DocumentOrigin>,
}

/// Outcome of one `ingest` call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub conversation_id: ConversationId,
    pub total_fragments: usize,
    pub total_edges_created: usize,
    /// `true` when the whole conversation matched an already-ingested one
    /// and `conversation_id` names the *existing* conversation.
    pub duplicate: bool,
}

/// The answer to one question without propagation (`GET /preguntar/`).
#[derive(Debug, Clone)]
pub struct AnswerContext {
    pub contexts_used: Vec<Fragment>,
    pub subgraph: query::QueryTree,
    pub analysis: Plan,
    pub strategy_applied: String,
    pub moment_of_query: NaiveDateTime,
    pub filtered_out_count: usize,
}

/// Additional propagation block returned by
/// `GET /preguntar-con-propagacion/`.
#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub direct_contexts: Vec<FragmentId>,
    pub indirect_contexts: Vec<FragmentId>,
    pub only_via_propagation: Vec<FragmentId>,
    pub total_nodes_reached: usize,
    pub activations: HashMap<FragmentId, f32>,
    pub sources: HashMap<FragmentId, FragmentId>,
    pub depths: HashMap<FragmentId, u32>,
}

#[derive(Debug, Clone)]
pub struct AnsweredWithPropagation {
    pub answer: AnswerContext,
    pub propagation: Option<PropagationReport>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub conversation_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DoubleLevelStats {
    pub conversation_count: usize,
    pub fragment_count: usize,
    pub avg_fragments_per_conversation: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PropagationState {
    pub lambda_decay: f32,
    pub tau_act: f32,
    pub exclude_temporal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MicroNode {
    pub id: FragmentId,
    pub label: String,
    pub icon: &'static str,
    pub context_type: ContextType,
    pub is_temporal: bool,
    pub is_pdf: bool,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, Serialize)]
pub struct MicroEdge {
    pub source: FragmentId,
    pub target: FragmentId,
    pub w_struct: f32,
    pub r_temp: f32,
    pub w_eff: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MicroView {
    pub nodes: Vec<MicroNode>,
    pub edges: Vec<MicroEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroNode {
    pub id: ConversationId,
    pub title: String,
    pub fragment_count: usize,
    pub is_temporal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroEdge {
    pub source: ConversationId,
    pub target: ConversationId,
    pub avg_w_eff: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroView {
    pub nodes: Vec<MacroNode>,
    pub edges: Vec<MacroEdge>,
}

/// Where the engine's state is persisted (ADR-003). Optional: an
/// in-memory-only `Engine` never touches disk.
struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    fn graph_bin(&self) -> PathBuf {
        self.root.join("grafo_contextos.bin")
    }
    fn contexto_json(&self) -> PathBuf {
        self.root.join("contexto.json")
    }
    fn conversaciones_json(&self) -> PathBuf {
        self.root.join("conversaciones.json")
    }
    fn fragmentos_json(&self) -> PathBuf {
        self.root.join("fragmentos.json")
    }
}

fn write_atomic_json<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| EngineError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Single top-level engine value: owns the graph, the vector index, the
/// tunable parameters, the conversation table, and the query analyzer.
/// `writer` serializes conversation-table mutation and parameter changes
/// the way `FragmentGraph`'s own writer lock serializes node/edge
/// mutation (ADR-002).
pub struct Engine {
    graph: FragmentGraph,
    vector_index: VectorIndex,
    params: RwLock<Parameters>,
    conversations: DashMap<ConversationId, ConversationRecord>,
    analyzer: Box<dyn QueryAnalyzer>,
    writer: Mutex<()>,
    storage: Option<StoragePaths>,
}

impl Engine {
    /// An in-memory engine with the deterministic rule-based analyzer and
    /// the mock (hash-based) embedder — the default for tests and offline
    /// use (ADR-008's "deterministic rule-based fallback must exist").
    pub fn in_memory() -> Self {
        Self {
            graph: FragmentGraph::new(),
            vector_index: VectorIndex::in_memory(),
            params: RwLock::new(Parameters::default()),
            conversations: DashMap::new(),
            analyzer: Box::new(RuleBasedAnalyzer),
            writer: Mutex::new(()),
            storage: None,
        }
    }

    pub fn with_analyzer(analyzer: Box<dyn QueryAnalyzer>) -> Self {
        Self { analyzer, ..Self::in_memory() }
    }

    pub fn with_vector_index(vector_index: VectorIndex) -> Self {
        Self { vector_index, ..Self::in_memory() }
    }

    /// Attach a persistence directory and load whatever snapshot already
    /// lives there (ADR-003's four-file layout). A corrupt binary graph
    /// dump falls back to the metadata file, recomputing edges.
    pub fn open(root: impl Into<PathBuf>) -> EngineResult<Self> {
        let mut engine = Self::in_memory();
        let storage = StoragePaths { root: root.into() };

        let outcome = engine.graph.snapshot_load(&storage.graph_bin(), &storage.contexto_json())?;
        for fragment in engine.graph.all_nodes() {
            engine.vector_index.upsert(&fragment.id, &fragment.text)?;
        }
        if outcome == LoadOutcome::MetadataOnlyNeedsRecompute {
            let params = *engine.params.read().unwrap();
            ingest::recompute_all(&engine.graph, &engine.vector_index, &params);
        }

        if let Ok(bytes) = fs::read(storage.conversaciones_json()) {
            if let Ok(records) = serde_json::from_slice::<Vec<ConversationRecord>>(&bytes) {
                for record in records {
                    engine.conversations.insert(record.id.clone(), record);
                }
            }
        }

        engine.storage = Some(storage);
        Ok(engine)
    }

    fn persist(&self) -> EngineResult<()> {
        let Some(storage) = &self.storage else { return Ok(()) };
        self.graph.snapshot_save(&storage.graph_bin(), &storage.contexto_json())?;

        let records: Vec<ConversationRecord> = self.conversations.iter().map(|r| r.value().clone()).collect();
        write_atomic_json(&storage.conversaciones_json(), &records)?;

        let fragments = self.graph.all_nodes();
        write_atomic_json(&storage.fragmentos_json(), &fragments)?;
        Ok(())
    }

    // -- ingest ----------------------------------------------------------

    fn resolve_fecha(fecha: Option<&str>) -> EngineResult<Option<NaiveDateTime>> {
        match fecha {
            None => Ok(None),
            Some(s) if s.eq_ignore_ascii_case(ATEMPORAL_SENTINEL) => Ok(None),
            Some(s) => temporal::parse_iso_datetime_safe(s)
                .map(Some)
                .ok_or_else(|| EngineError::Validation(format!("unparseable fecha: {s}"))),
        }
    }

    /// Ingest one conversation: validate, fragment, de-duplicate, insert,
    /// embed, and form edges (ADR-007's batch path), then persist a
    /// snapshot if a storage directory is attached.
    pub fn ingest(&self, request: IngestRequest) -> EngineResult<IngestStats> {
        if request.text.trim().is_empty() {
            return Err(EngineError::Validation("body text must not be empty".into()));
        }
        if let Some(origin) = &request.document_origin {
            if origin.source_document.is_empty() {
                return Err(EngineError::Validation("attachment missing a source filename".into()));
            }
        }

        let base_timestamp = Self::resolve_fecha(request.fecha.as_deref())?;
        let conversation_id = ConversationId::new();

        let fragments = fragment::fragment_conversation_with(
            FragmentInput {
                conversation_id: conversation_id.clone(),
                title: &request.title,
                text: &request.text,
                base_timestamp,
                inherited_type: None,
                document_origin: request.document_origin.clone(),
            },
            DEFAULT_MAX_WORDS,
            DEFAULT_MIN_WORDS,
        );
        if fragments.is_empty() {
            return Err(EngineError::EmptyIngest);
        }

        let _guard = self.writer.lock().unwrap();
        let params = *self.params.read().unwrap();
        let outcomes = ingest::ingest_conversation(&self.graph, &self.vector_index, fragments, &params);

        let all_duplicate = outcomes.iter().all(|o| matches!(o, IngestOutcome::Duplicate { .. }));
        if all_duplicate {
            let existing_conversation = outcomes.first().and_then(|o| match o {
                IngestOutcome::Duplicate { existing_id } => self.graph.get_node(existing_id).map(|f| f.conversation_id),
                _ => None,
            });
            return Ok(IngestStats {
                conversation_id: existing_conversation.unwrap_or(conversation_id),
                total_fragments: 0,
                total_edges_created: 0,
                duplicate: true,
            });
        }

        let mut total_edges = 0usize;
        let mut added_ids = Vec::new();
        for outcome in &outcomes {
            if let IngestOutcome::Added { id, edges_created } = outcome {
                total_edges += edges_created;
                added_ids.push(id.clone());
            }
        }

        let mut record = ConversationRecord::new(request.title.clone());
        record.id = conversation_id.clone();
        record.fecha = base_timestamp;
        record.participants = request.participants;
        record.metadata = request.metadata;
        record.fragment_ids = added_ids.clone();
        self.conversations.insert(conversation_id.clone(), record);

        drop(_guard);
        self.persist()?;

        Ok(IngestStats {
            conversation_id,
            total_fragments: added_ids.len(),
            total_edges_created: total_edges,
            duplicate: false,
        })
    }

    /// Batch ingest, with per-item error reporting
    /// (`POST /conversacion/procesar-con-metadata/`).
    pub fn ingest_batch(&self, requests: Vec<IngestRequest>) -> Vec<Result<IngestStats, String>> {
        requests.into_iter().map(|r| self.ingest(r).map_err(|e| e.to_string())).collect()
    }

    /// Parse-only preview: the fragmentation boundaries `ingest` would
    /// produce, without committing anything (`POST
    /// /conversacion/parse-preview/`).
    pub fn parse_preview(&self, text: &str) -> Vec<String> {
        fragment::criterio_fragmentacion_semantica(text, DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS)
    }

    pub fn fragment_metadata(&self) -> Vec<Fragment> {
        self.graph.all_nodes()
    }

    pub fn conversation_metadata(&self) -> Vec<ConversationRecord> {
        self.conversations.iter().map(|r| r.value().clone()).collect()
    }

    // -- query -------------------------------------------------------------

    pub async fn analyze_query(&self, question: &str, now: NaiveDateTime) -> Plan {
        let alpha = self.params.read().unwrap().alpha_temp;
        self.analyzer.analyze(question, now, alpha).await
    }

    pub fn semantic_search(&self, text: &str, k: usize) -> EngineResult<Vec<(FragmentId, f32)>> {
        Ok(self.vector_index.query(text, k)?)
    }

    fn strategy_label(plan: &Plan, selection: &SelectionResult) -> String {
        if plan.intent == Intent::Structural {
            return "structural_semantic".to_string();
        }
        match selection.strategy {
            SelectionStrategy::SemanticOnly => "semantic_only",
            SelectionStrategy::WindowFiltered => "temporal_window",
            SelectionStrategy::FullScanWindow => "temporal_fallback_full_scan",
            SelectionStrategy::ClosestByTime => "temporal_fallback_closest",
            SelectionStrategy::UnfilteredFallback => "temporal_fallback_unfiltered",
        }
        .to_string()
    }

    /// `GET /preguntar/`: analyze, select, and build the scored subgraph —
    /// no propagation.
    pub async fn ask(&self, question: &str, now: NaiveDateTime) -> AnswerContext {
        let params = *self.params.read().unwrap();
        let plan = self.analyzer.analyze(question, now, params.alpha_temp).await;
        let selection = query::select(&self.graph, &self.vector_index, question, &plan, params.k);
        let contexts_used: Vec<Fragment> =
            selection.candidates.iter().filter_map(|id| self.graph.get_node(id)).collect();
        let subgraph = query::build_query_tree(&self.graph, &self.vector_index, question, &selection.candidates, &plan, now);
        let strategy_applied = Self::strategy_label(&plan, &selection);

        AnswerContext {
            contexts_used,
            subgraph,
            strategy_applied,
            filtered_out_count: selection.filtered_out_count,
            moment_of_query: now,
            analysis: plan,
        }
    }

    /// `GET /preguntar-con-propagacion/`: same as `ask`, optionally
    /// expanded via spreading activation.
    #[allow(clippy::too_many_arguments)]
    pub async fn ask_with_propagation(
        &self,
        question: &str,
        now: NaiveDateTime,
        use_propagation: bool,
        max_steps: u32,
        decay_factor: Option<f32>,
        activation_threshold: Option<f32>,
        k_initial: Option<usize>,
    ) -> AnsweredWithPropagation {
        let mut params = *self.params.read().unwrap();
        if let Some(k) = k_initial {
            params = params.with_k(k);
        }
        let plan = self.analyzer.analyze(question, now, params.alpha_temp).await;
        let selection = query::select(&self.graph, &self.vector_index, question, &plan, params.k);
        let contexts_used: Vec<Fragment> =
            selection.candidates.iter().filter_map(|id| self.graph.get_node(id)).collect();
        let subgraph = query::build_query_tree(&self.graph, &self.vector_index, question, &selection.candidates, &plan, now);
        let strategy_applied = Self::strategy_label(&plan, &selection);

        let propagation = if use_propagation {
            let lambda = decay_factor.unwrap_or(params.lambda_decay);
            let tau_act = activation_threshold.unwrap_or(params.tau_act);
            let propagator = Propagator::new(&self.graph, lambda, tau_act);
            let merged = propagator.propagate_from_query(question, &selection.candidates, max_steps);

            let direct: std::collections::HashSet<FragmentId> = selection.candidates.iter().cloned().collect();
            let indirect: Vec<FragmentId> = merged.keys().filter(|id| !direct.contains(*id)).cloned().collect();

            let activations = merged.iter().map(|(id, m)| (id.clone(), m.activation)).collect();
            let sources = merged.iter().map(|(id, m)| (id.clone(), m.dominant_source.clone())).collect();
            let depths = merged.iter().map(|(id, m)| (id.clone(), m.depth)).collect();

            Some(PropagationReport {
                direct_contexts: selection.candidates.clone(),
                only_via_propagation: indirect.clone(),
                total_nodes_reached: selection.candidates.len() + indirect.len(),
                indirect_contexts: indirect,
                activations,
                sources,
                depths,
            })
        } else {
            None
        };

        AnsweredWithPropagation {
            answer: AnswerContext {
                contexts_used,
                subgraph,
                strategy_applied,
                filtered_out_count: selection.filtered_out_count,
                moment_of_query: now,
                analysis: plan,
            },
            propagation,
        }
    }

    // -- parameters ----------------------------------------------------

    pub fn parameter_state(&self) -> Parameters {
        *self.params.read().unwrap()
    }

    /// `POST /configurar-parametros/`: changing `tau_sim` invalidates every
    /// existing edge ("edge exists iff w_struct > τ_sim"), so a change
    /// triggers `recompute_all` before returning.
    pub fn configure_parameters(
        &self,
        tau_sim: Option<f32>,
        alpha_temp: Option<f32>,
        k: Option<usize>,
    ) -> EngineResult<Parameters> {
        let _guard = self.writer.lock().unwrap();
        let mut params = *self.params.read().unwrap();
        let tau_sim_changed = tau_sim.map(|v| v != params.tau_sim).unwrap_or(false);

        if let Some(v) = tau_sim {
            params = params.with_tau_sim(v);
        }
        if let Some(v) = alpha_temp {
            params = params.with_alpha_temp(v);
        }
        if let Some(v) = k {
            params = params.with_k(v);
        }
        *self.params.write().unwrap() = params;

        if tau_sim_changed {
            ingest::recompute_all(&self.graph, &self.vector_index, &params);
        }
        drop(_guard);
        self.persist()?;
        Ok(params)
    }

    /// `POST /configurar-propagacion/`.
    pub fn configure_propagation(&self, lambda_decay: f32, tau_act: f32) -> Parameters {
        let _guard = self.writer.lock().unwrap();
        let mut params = *self.params.read().unwrap();
        params = params.with_lambda_decay(lambda_decay).with_tau_act(tau_act);
        *self.params.write().unwrap() = params;
        params
    }

    // -- stats & views ---------------------------------------------------

    pub fn update_stats(&self) -> UpdateStats {
        UpdateStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            conversation_count: self.conversations.len(),
        }
    }

    pub fn double_level_stats(&self) -> DoubleLevelStats {
        let conversation_count = self.conversations.len();
        let fragment_count = self.graph.node_count();
        let avg = if conversation_count == 0 {
            0.0
        } else {
            fragment_count as f32 / conversation_count as f32
        };
        DoubleLevelStats { conversation_count, fragment_count, avg_fragments_per_conversation: avg }
    }

    pub fn propagation_state(&self) -> PropagationState {
        let params = *self.params.read().unwrap();
        PropagationState { lambda_decay: params.lambda_decay, tau_act: params.tau_act, exclude_temporal: false }
    }

    /// `GET /grafo/micro/fragmentos/`: the full fragment graph, enriched
    /// with UI hints (icons) for the collaborator's renderer.
    pub fn micro_fragments_view(&self) -> MicroView {
        let nodes: Vec<MicroNode> = self
            .graph
            .all_nodes()
            .into_iter()
            .map(|f| MicroNode {
                id: f.id.clone(),
                label: f.title.clone(),
                icon: f.context_type.icon(),
                context_type: f.context_type,
                is_temporal: f.timestamp.is_some(),
                is_pdf: f.is_pdf_fragment,
                conversation_id: f.conversation_id.clone(),
            })
            .collect();

        let mut edges = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for node in &nodes {
            for neighbor in self.graph.neighbors(&node.id) {
                let key = if node.id < neighbor { (node.id.clone(), neighbor.clone()) } else { (neighbor.clone(), node.id.clone()) };
                if !seen.insert(key) {
                    continue;
                }
                if let Some(edge) = self.graph.edge_data(&node.id, &neighbor) {
                    edges.push(MicroEdge { source: edge.source, target: edge.target, w_struct: edge.w_struct, r_temp: edge.r_temp, w_eff: edge.w_eff });
                }
            }
        }
        MicroView { nodes, edges }
    }

    /// `GET /grafo/micro/conversacion/{id}`: the same view, scoped to one
    /// conversation's fragments and the edges between them.
    pub fn micro_conversation_view(&self, conversation_id: &ConversationId) -> MicroView {
        let full = self.micro_fragments_view();
        let member_ids: std::collections::HashSet<FragmentId> =
            full.nodes.iter().filter(|n| &n.conversation_id == conversation_id).map(|n| n.id.clone()).collect();

        MicroView {
            nodes: full.nodes.into_iter().filter(|n| member_ids.contains(&n.id)).collect(),
            edges: full
                .edges
                .into_iter()
                .filter(|e| member_ids.contains(&e.source) && member_ids.contains(&e.target))
                .collect(),
        }
    }

    /// `GET /grafo/macro/conversaciones/`: conversation-level rollup —
    /// every conversation is a node, and conversations with at least one
    /// inter-fragment edge are joined by an edge carrying the average
    /// `w_eff` across that pair's fragment-level edges.
    pub fn macro_conversations_view(&self) -> MacroView {
        let fragment_conversation: HashMap<FragmentId, ConversationId> =
            self.graph.all_nodes().into_iter().map(|f| (f.id, f.conversation_id)).collect();

        let nodes: Vec<MacroNode> = self
            .conversations
            .iter()
            .map(|r| {
                let record = r.value();
                MacroNode {
                    id: record.id.clone(),
                    title: record.title.clone(),
                    fragment_count: record.fragment_ids.len(),
                    is_temporal: record.fecha.is_some(),
                }
            })
            .collect();

        let mut pair_sums: HashMap<(ConversationId, ConversationId), (f32, usize)> = HashMap::new();
        for fragment in self.graph.all_nodes() {
            for neighbor in self.graph.neighbors(&fragment.id) {
                let Some(edge) = self.graph.edge_data(&fragment.id, &neighbor) else { continue };
                let Some(other_conv) = fragment_conversation.get(&neighbor) else { continue };
                if *other_conv == fragment.conversation_id {
                    continue;
                }
                let key = if fragment.conversation_id < *other_conv {
                    (fragment.conversation_id.clone(), other_conv.clone())
                } else {
                    (other_conv.clone(), fragment.conversation_id.clone())
                };
                let entry = pair_sums.entry(key).or_insert((0.0, 0));
                entry.0 += edge.w_eff;
                entry.1 += 1;
            }
        }

        let edges = pair_sums
            .into_iter()
            .map(|((source, target), (sum, count))| MacroEdge { source, target, avg_w_eff: sum / count as f32 })
            .collect();

        MacroView { nodes, edges }
    }

    /// `DELETE /api/borrar-todos-datos`: wipe every node, edge,
    /// conversation, and vector.
    pub fn wipe_all_data(&self) -> EngineResult<()> {
        let _guard = self.writer.lock().unwrap();
        self.graph.clear_all();
        self.vector_index.reset();
        self.conversations.clear();
        drop(_guard);
        self.persist()
    }
}
