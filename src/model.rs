//! Core data model: fragments, edges, conversations, and tunable parameters.
//!
//! Mirrors the shape the storage and query layers agree on — a fragment is
//! the unit of recall, an edge is a directed, weighted relation between two
//! fragments, and a conversation is the ingest-time grouping fragments are
//! derived from.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a fragment.
///
/// Serializes as a plain string. Produced either randomly (`new`) or
/// deterministically from content (`from_content`) so repeated ingestion of
/// the same text upserts instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Namespace used for content-derived ids, keeping re-ingestion of
    /// identical text idempotent.
    const NAMESPACE: Uuid = Uuid::from_bytes([
        0x5f, 0x3a, 0x1c, 0x88, 0x0b, 0x4e, 0x46, 0x1a, 0x9d, 0x2f, 0x6a, 0x77, 0x1e, 0xcb, 0x43,
        0x01,
    ]);

    pub fn from_content(conversation_id: &ConversationId, text: &str) -> Self {
        let hash_input = format!("{}:{}", conversation_id.as_str(), text);
        Self(Uuid::new_v5(&Self::NAMESPACE, hash_input.as_bytes()).to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FragmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation (an ingest-time grouping of fragments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed classification of what a fragment (or conversation) is about.
///
/// Closed rather than an open string: every consumer (edge-weight half-life
/// table, UI icon mapping, fragmenter classification) switches on the full
/// set, so an unknown variant would silently fall through every one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Meeting,
    Task,
    Event,
    Project,
    Knowledge,
    Document,
    Decision,
    Action,
    Question,
    Conclusion,
    Problem,
    General,
}

impl ContextType {
    /// Half-life (in days) used by the temporal relevance formula.
    ///
    /// Only the five variants the original weighting scheme names carry a
    /// distinct half-life; everything else decays like `General`.
    pub fn half_life_days(self) -> f64 {
        match self {
            ContextType::Meeting => 2.0,
            ContextType::Task => 7.0,
            ContextType::Event => 3.0,
            ContextType::Project => 45.0,
            ContextType::Knowledge => 365.0,
            _ => 30.0,
        }
    }

    /// UI hint icon, carried through query-tree exports.
    pub fn icon(self) -> &'static str {
        match self {
            ContextType::Meeting => "\u{1F465}",
            ContextType::Task => "\u{1F4CB}",
            ContextType::Event => "\u{1F3AF}",
            ContextType::Project => "\u{1F680}",
            ContextType::Knowledge => "\u{1F4DA}",
            ContextType::Document => "\u{1F4C4}",
            _ => "\u{1F4C4}",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextType::Meeting => "meeting",
            ContextType::Task => "task",
            ContextType::Event => "event",
            ContextType::Project => "project",
            ContextType::Knowledge => "knowledge",
            ContextType::Document => "document",
            ContextType::Decision => "decision",
            ContextType::Action => "action",
            ContextType::Question => "question",
            ContextType::Conclusion => "conclusion",
            ContextType::Problem => "problem",
            ContextType::General => "general",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meeting" | "reunion" | "reunión" => Ok(ContextType::Meeting),
            "task" | "tarea" => Ok(ContextType::Task),
            "event" | "evento" => Ok(ContextType::Event),
            "project" | "proyecto" => Ok(ContextType::Project),
            "knowledge" | "conocimiento" => Ok(ContextType::Knowledge),
            "document" | "documento" => Ok(ContextType::Document),
            "decision" | "decisión" => Ok(ContextType::Decision),
            "action" | "accion" | "acción" => Ok(ContextType::Action),
            "question" | "pregunta" => Ok(ContextType::Question),
            "conclusion" | "conclusión" => Ok(ContextType::Conclusion),
            "problem" | "problema" => Ok(ContextType::Problem),
            "general" => Ok(ContextType::General),
            other => Err(format!("unknown context type: {}", other)),
        }
    }
}

impl Default for ContextType {
    fn default() -> Self {
        ContextType::General
    }
}

/// Where a fragment's text originated, when it was lifted out of an
/// already-extracted document rather than typed conversation.
///
/// PDF text extraction itself stays a collaborator's job; this only carries
/// through the provenance fields a collaborator hands us along with the
/// extracted text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentOrigin {
    pub source_document: String,
    pub position_in_doc: u32,
}

/// A unit of recall: one segment of a conversation, with the attributes the
/// edge-weight engine and query pipeline need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub conversation_id: ConversationId,
    pub title: String,
    pub text: String,
    pub keywords: BTreeSet<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub context_type: ContextType,
    pub position_in_conversation: u32,
    pub total_in_conversation: u32,
    pub created_at: DateTime<Utc>,
    pub is_pdf_fragment: bool,
    pub source_document: Option<String>,
    pub position_in_doc: Option<u32>,
}

impl Fragment {
    pub fn new(conversation_id: ConversationId, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: FragmentId::new(),
            conversation_id,
            title: title.into(),
            text: text.into(),
            keywords: BTreeSet::new(),
            timestamp: None,
            context_type: ContextType::General,
            position_in_conversation: 0,
            total_in_conversation: 1,
            created_at: Utc::now(),
            is_pdf_fragment: false,
            source_document: None,
            position_in_doc: None,
        }
    }

    pub fn with_document_origin(mut self, origin: DocumentOrigin) -> Self {
        self.is_pdf_fragment = true;
        self.source_document = Some(origin.source_document);
        self.position_in_doc = Some(origin.position_in_doc);
        self
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// The kind of relation an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Structural similarity only — no usable temporal signal on either side.
    Semantic,
    /// Structural similarity reinforced by temporal proximity.
    SemanticTemporal,
}

/// A directed, weighted relation between two fragments.
///
/// Always materialized in both directions (Invariant: edges are
/// bidirectional) with identical attributes — `source`/`target` describe
/// this direction's traversal, not an asymmetry in the relation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: FragmentId,
    pub target: FragmentId,
    pub w_struct: f32,
    pub r_temp: f32,
    pub w_eff: f32,
    pub edge_type: EdgeType,
    pub context_types: (ContextType, ContextType),
    pub created_at: DateTime<Utc>,
}

impl Edge {
    /// `both_timestamped` decides `edge_type` directly — "semantic_temporal
    /// iff both endpoints have a timestamp" — rather than inferring it from
    /// whether `r_temp` happens to be nonzero, since `r_temp` can underflow
    /// to exactly `0.0` for two timestamped fragments separated by an
    /// extreme gap.
    pub fn new(
        source: FragmentId,
        target: FragmentId,
        w_struct: f32,
        r_temp: f32,
        w_eff: f32,
        context_types: (ContextType, ContextType),
        both_timestamped: bool,
    ) -> Self {
        let edge_type = if both_timestamped {
            EdgeType::SemanticTemporal
        } else {
            EdgeType::Semantic
        };
        Self {
            source,
            target,
            w_struct,
            r_temp,
            w_eff,
            edge_type,
            context_types,
            created_at: Utc::now(),
        }
    }

    /// The reverse-direction twin of this edge, used when materializing the
    /// symmetric pair.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
            w_struct: self.w_struct,
            r_temp: self.r_temp,
            w_eff: self.w_eff,
            edge_type: self.edge_type,
            context_types: (self.context_types.1, self.context_types.0),
            created_at: self.created_at,
        }
    }
}

/// An ingest-time grouping of fragments, carrying shared metadata (title,
/// date, participants) down to every fragment derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub title: String,
    pub fecha: Option<NaiveDateTime>,
    pub participants: Vec<String>,
    /// Open-ended side payload a collaborator may attach (free-form metadata
    /// that doesn't map onto a typed field here).
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub fragment_ids: Vec<FragmentId>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            title: title.into(),
            fecha: None,
            participants: Vec::new(),
            metadata: serde_json::Value::Null,
            fragment_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Tunable engine parameters. Each field clamps to its documented range
/// rather than panicking on an out-of-range input — callers configuring the
/// engine from an HTTP request body shouldn't be able to crash the process
/// with a bad number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Parameters {
    /// Minimum structural similarity for an edge to form. The only parameter
    /// end users are expected to tune directly.
    pub tau_sim: f32,
    /// Candidate pool size for retrieval (top-K).
    pub k: usize,
    /// Temporal weighting multiplier used by the adaptive query-tree score.
    pub alpha_temp: f32,
    /// Per-hop activation decay during propagation.
    pub lambda_decay: f32,
    /// Activation floor below which propagation halts.
    pub tau_act: f32,
}

impl Parameters {
    pub const TAU_SIM_RANGE: (f32, f32) = (0.1, 0.9);
    pub const K_RANGE: (usize, usize) = (3, 15);
    pub const ALPHA_TEMP_RANGE: (f32, f32) = (0.5, 3.0);
    pub const LAMBDA_DECAY_RANGE: (f32, f32) = (0.1, 1.0);
    pub const TAU_ACT_RANGE: (f32, f32) = (0.01, 0.5);

    pub fn with_tau_sim(mut self, value: f32) -> Self {
        self.tau_sim = value.clamp(Self::TAU_SIM_RANGE.0, Self::TAU_SIM_RANGE.1);
        self
    }

    pub fn with_k(mut self, value: usize) -> Self {
        self.k = value.clamp(Self::K_RANGE.0, Self::K_RANGE.1);
        self
    }

    pub fn with_alpha_temp(mut self, value: f32) -> Self {
        self.alpha_temp = value.clamp(Self::ALPHA_TEMP_RANGE.0, Self::ALPHA_TEMP_RANGE.1);
        self
    }

    pub fn with_lambda_decay(mut self, value: f32) -> Self {
        self.lambda_decay = value.clamp(Self::LAMBDA_DECAY_RANGE.0, Self::LAMBDA_DECAY_RANGE.1);
        self
    }

    pub fn with_tau_act(mut self, value: f32) -> Self {
        self.tau_act = value.clamp(Self::TAU_ACT_RANGE.0, Self::TAU_ACT_RANGE.1);
        self
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tau_sim: 0.5,
            k: 5,
            alpha_temp: 1.5,
            lambda_decay: 0.8,
            tau_act: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_id_from_content_is_deterministic() {
        let conv = ConversationId::from_string("conv-1");
        let a = FragmentId::from_content(&conv, "hello world");
        let b = FragmentId::from_content(&conv, "hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn fragment_id_from_content_differs_by_conversation() {
        let a = FragmentId::from_content(&ConversationId::from_string("conv-1"), "hello world");
        let b = FragmentId::from_content(&ConversationId::from_string("conv-2"), "hello world");
        assert_ne!(a, b);
    }

    #[test]
    fn context_type_round_trips_through_str() {
        for ct in [
            ContextType::Meeting,
            ContextType::Task,
            ContextType::Event,
            ContextType::Project,
            ContextType::Knowledge,
            ContextType::General,
        ] {
            let parsed: ContextType = ct.to_string().parse().unwrap();
            assert_eq!(parsed, ct);
        }
    }

    #[test]
    fn context_type_equality_ignores_derive_gaps() {
        assert_eq!(ContextType::Meeting, ContextType::Meeting);
        assert_ne!(ContextType::Meeting, ContextType::Task);
    }

    #[test]
    fn half_life_matches_documented_table() {
        assert_eq!(ContextType::Meeting.half_life_days(), 2.0);
        assert_eq!(ContextType::Task.half_life_days(), 7.0);
        assert_eq!(ContextType::Event.half_life_days(), 3.0);
        assert_eq!(ContextType::Project.half_life_days(), 45.0);
        assert_eq!(ContextType::Knowledge.half_life_days(), 365.0);
        assert_eq!(ContextType::General.half_life_days(), 30.0);
        assert_eq!(ContextType::Document.half_life_days(), 30.0);
    }

    #[test]
    fn parameters_clamp_out_of_range_inputs() {
        let p = Parameters::default().with_tau_sim(5.0).with_k(100).with_tau_act(-1.0);
        assert_eq!(p.tau_sim, Parameters::TAU_SIM_RANGE.1);
        assert_eq!(p.k, Parameters::K_RANGE.1);
        assert_eq!(p.tau_act, Parameters::TAU_ACT_RANGE.0);
    }

    #[test]
    fn edge_reversed_swaps_endpoints_and_context_types() {
        let e = Edge::new(
            FragmentId::from_string("a"),
            FragmentId::from_string("b"),
            0.6,
            0.2,
            0.4,
            (ContextType::Task, ContextType::Meeting),
            true,
        );
        let r = e.reversed();
        assert_eq!(r.source, e.target);
        assert_eq!(r.target, e.source);
        assert_eq!(r.context_types, (ContextType::Meeting, ContextType::Task));
    }
}

