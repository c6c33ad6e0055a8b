//! MCP server for the PCG engine — exposes ingest, query, configuration,
//! and graph-view operations via the Model Context Protocol.
//!
//! Tools: 4 ingest + 4 query + 2 configure + 6 stats/view + 1 wipe = 17 total.

pub mod params;

use params::*;
use crate::api::{Engine, IngestRequest};
use crate::model::{ConversationId, Parameters};
use crate::query::{Intent, Plan};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters as ToolParams},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::Temporal => "temporal",
        Intent::Structural => "structural",
        Intent::Mixed => "mixed",
    }
}

fn plan_json(plan: &Plan) -> serde_json::Value {
    serde_json::json!({
        "intent": intent_label(plan.intent),
        "confidence": plan.confidence,
        "reference_timestamp": plan.reference_timestamp.map(|t| t.to_string()),
        "window": plan.window.map(|w| serde_json::json!({
            "start": w.start.to_string(),
            "end": w.end.to_string(),
        })),
        "temporal_factor": plan.temporal_factor,
    })
}

fn parameters_json(params: &Parameters) -> serde_json::Value {
    serde_json::json!({
        "tau_sim": params.tau_sim,
        "k": params.k,
        "alpha_temp": params.alpha_temp,
        "lambda_decay": params.lambda_decay,
        "tau_act": params.tau_act,
    })
}

// ---------------------------------------------------------------------------
// PcgMcpServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PcgMcpServer {
    engine: Arc<Engine>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PcgMcpServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    // ── Ingest tools ────────────────────────────────────────────────────

    #[tool(description = "Ingest a conversation: fragment the text, classify each fragment, and form edges against the rest of the graph")]
    fn ingest_conversation(
        &self,
        ToolParams(p): ToolParams<IngestConversationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = IngestRequest {
            title: p.title,
            text: p.text,
            fecha: p.fecha,
            participants: p.participants.unwrap_or_default(),
            metadata: serde_json::Value::Null,
            document_origin: None,
        };
        match self.engine.ingest(request) {
            Ok(stats) => ok_text(
                serde_json::to_string_pretty(&serde_json::json!({
                    "conversation_id": stats.conversation_id.as_str(),
                    "total_fragments": stats.total_fragments,
                    "total_edges_created": stats.total_edges_created,
                    "duplicate": stats.duplicate,
                }))
                .unwrap(),
            ),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Preview how a conversation's text would be split into fragments, without committing anything")]
    fn parse_preview(
        &self,
        ToolParams(p): ToolParams<ParsePreviewParams>,
    ) -> Result<CallToolResult, McpError> {
        let fragments = self.engine.parse_preview(&p.text);
        ok_text(serde_json::to_string_pretty(&fragments).unwrap())
    }

    #[tool(description = "List metadata for every ingested fragment")]
    fn list_fragments(&self) -> Result<CallToolResult, McpError> {
        let fragments = self.engine.fragment_metadata();
        ok_text(serde_json::to_string_pretty(&fragments).unwrap())
    }

    #[tool(description = "List metadata for every ingested conversation")]
    fn list_conversations(&self) -> Result<CallToolResult, McpError> {
        let conversations = self.engine.conversation_metadata();
        ok_text(serde_json::to_string_pretty(&conversations).unwrap())
    }

    // ── Query tools ─────────────────────────────────────────────────────

    #[tool(description = "Answer a question against the fragment graph, returning the contexts used and a scored subgraph")]
    async fn ask(&self, ToolParams(p): ToolParams<AskParams>) -> Result<CallToolResult, McpError> {
        let now = chrono::Utc::now().naive_utc();
        let answer = self.engine.ask(&p.question, now).await;
        ok_text(
            serde_json::to_string_pretty(&serde_json::json!({
                "contexts_used": answer.contexts_used,
                "strategy_applied": answer.strategy_applied,
                "filtered_out_count": answer.filtered_out_count,
                "analysis": plan_json(&answer.analysis),
            }))
            .unwrap(),
        )
    }

    #[tool(description = "Answer a question and optionally expand the result via spreading-activation propagation")]
    async fn ask_with_propagation(
        &self,
        ToolParams(p): ToolParams<AskWithPropagationParams>,
    ) -> Result<CallToolResult, McpError> {
        let now = chrono::Utc::now().naive_utc();
        let result = self
            .engine
            .ask_with_propagation(
                &p.question,
                now,
                p.use_propagation.unwrap_or(false),
                p.max_steps.unwrap_or(3),
                None,
                None,
                None,
            )
            .await;

        let propagation = result.propagation.map(|prop| {
            serde_json::json!({
                "direct_contexts": prop.direct_contexts.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "indirect_contexts": prop.indirect_contexts.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "total_nodes_reached": prop.total_nodes_reached,
            })
        });

        ok_text(
            serde_json::to_string_pretty(&serde_json::json!({
                "contexts_used": result.answer.contexts_used,
                "strategy_applied": result.answer.strategy_applied,
                "analysis": plan_json(&result.answer.analysis),
                "propagation": propagation,
            }))
            .unwrap(),
        )
    }

    #[tool(description = "Run semantic nearest-neighbor search over fragment text without building a full answer")]
    fn semantic_search(
        &self,
        ToolParams(p): ToolParams<SemanticSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.engine.semantic_search(&p.text, p.k.unwrap_or(5)) {
            Ok(hits) => ok_text(
                serde_json::to_string_pretty(
                    &hits.into_iter().map(|(id, score)| serde_json::json!({"id": id.as_str(), "score": score})).collect::<Vec<_>>(),
                )
                .unwrap(),
            ),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Classify a question's temporal intent without running a full query")]
    async fn analyze_query(&self, ToolParams(p): ToolParams<AskParams>) -> Result<CallToolResult, McpError> {
        let now = chrono::Utc::now().naive_utc();
        let plan = self.engine.analyze_query(&p.question, now).await;
        ok_text(serde_json::to_string_pretty(&plan_json(&plan)).unwrap())
    }

    // ── Configuration tools ─────────────────────────────────────────────

    #[tool(description = "Update engine parameters (tau_sim, alpha_temp, k); changing tau_sim recomputes every edge")]
    fn configure_parameters(
        &self,
        ToolParams(p): ToolParams<ConfigureParametersParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.engine.configure_parameters(p.tau_sim, p.alpha_temp, p.k) {
            Ok(params) => ok_text(serde_json::to_string_pretty(&parameters_json(&params)).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Update spreading-activation parameters (lambda_decay, tau_act)")]
    fn configure_propagation(
        &self,
        ToolParams(p): ToolParams<ConfigurePropagationParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = self.engine.configure_propagation(p.lambda_decay, p.tau_act);
        ok_text(serde_json::to_string_pretty(&parameters_json(&params)).unwrap())
    }

    // ── Stats & view tools ──────────────────────────────────────────────

    #[tool(description = "Node/edge/conversation counts for the current graph")]
    fn update_stats(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.update_stats()).unwrap())
    }

    #[tool(description = "Conversation/fragment rollup counts")]
    fn double_level_stats(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.double_level_stats()).unwrap())
    }

    #[tool(description = "Current propagation parameters")]
    fn propagation_state(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.propagation_state()).unwrap())
    }

    #[tool(description = "The full fragment-level graph (nodes and edges), for rendering a detailed view")]
    fn micro_fragments_view(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.micro_fragments_view()).unwrap())
    }

    #[tool(description = "The fragment-level graph scoped to a single conversation")]
    fn micro_conversation_view(
        &self,
        ToolParams(p): ToolParams<ConversationIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = ConversationId::from_string(p.conversation_id);
        ok_text(serde_json::to_string_pretty(&self.engine.micro_conversation_view(&id)).unwrap())
    }

    #[tool(description = "The conversation-level rollup graph, for a high-level overview")]
    fn macro_conversations_view(&self) -> Result<CallToolResult, McpError> {
        ok_text(serde_json::to_string_pretty(&self.engine.macro_conversations_view()).unwrap())
    }

    // ── Destructive tools ───────────────────────────────────────────────

    #[tool(description = "Wipe every node, edge, conversation, and vector from the engine")]
    fn wipe_all_data(&self) -> Result<CallToolResult, McpError> {
        match self.engine.wipe_all_data() {
            Ok(()) => ok_text("all data wiped".to_string()),
            Err(e) => err_text(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for PcgMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "PCG MCP server — conversational context ingest, temporal/structural query, and graph-view tools"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run_mcp_server(db_path: Option<PathBuf>) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let root = db_path.unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(".pcg-data")
        });
        let engine = match Engine::open(&root) {
            Ok(e) => e,
            Err(e) => {
                eprintln!("failed to open engine state at {}: {}", root.display(), e);
                return 1;
            }
        };

        let server = PcgMcpServer::new(Arc::new(engine));

        eprintln!("pcg mcp server starting on stdio...");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {}", e);
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            eprintln!("MCP server error: {}", e);
            return 1;
        }

        0
    })
}
