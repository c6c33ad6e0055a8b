//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestConversationParams {
    #[schemars(description = "Conversation title")]
    pub title: String,
    #[schemars(description = "Raw conversation text to fragment and ingest")]
    pub text: String,
    #[schemars(
        description = "ISO-8601 date/time for the conversation, or the literal string \"ATEMPORAL\" for content with no date"
    )]
    pub fecha: Option<String>,
    #[schemars(description = "Participant names")]
    pub participants: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ParsePreviewParams {
    #[schemars(description = "Raw conversation text to preview fragmentation for")]
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskParams {
    #[schemars(description = "Natural-language question")]
    pub question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskWithPropagationParams {
    #[schemars(description = "Natural-language question")]
    pub question: String,
    #[schemars(description = "Whether to run spreading-activation propagation from the selected candidates")]
    pub use_propagation: Option<bool>,
    #[schemars(description = "Maximum propagation hops (capped at 3)")]
    pub max_steps: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticSearchParams {
    #[schemars(description = "Free text to embed and search with")]
    pub text: String,
    #[schemars(description = "Number of nearest neighbors to return")]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigureParametersParams {
    #[schemars(description = "Minimum structural similarity for an edge to form (0.1-0.9)")]
    pub tau_sim: Option<f32>,
    #[schemars(description = "Temporal weighting multiplier (0.5-3.0)")]
    pub alpha_temp: Option<f32>,
    #[schemars(description = "Candidate pool size for retrieval (3-15)")]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigurePropagationParams {
    #[schemars(description = "Per-hop activation decay (0.1-1.0)")]
    pub lambda_decay: f32,
    #[schemars(description = "Activation floor below which propagation halts (0.01-0.5)")]
    pub tau_act: f32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConversationIdParams {
    #[schemars(description = "Conversation id")]
    pub conversation_id: String,
}
