use std::sync::Arc;

use ig_core::{ArcValue, Error as CoreError, Idea, NodeId, NodeStore, Unifier, discover_relations};
use ig_store::Workspace;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

/// MCP surface over one workspace. Tool calls are serialised by the mutex,
/// so each unification runs alone against the store.
#[derive(Clone)]
pub struct IgServer {
    state: Arc<Mutex<Workspace>>,
    tool_router: ToolRouter<Self>,
}

impl IgServer {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            state: Arc::new(Mutex::new(workspace)),
            tool_router: Self::tool_router(),
        }
    }
}

/// Structural failures are the caller's to fix; store failures are ours.
fn core_error(e: CoreError) -> McpError {
    if e.is_retryable() {
        McpError::internal_error(e.to_string(), None)
    } else {
        McpError::invalid_params(e.to_string(), None)
    }
}

fn parse_id(s: &str) -> Result<NodeId, McpError> {
    s.parse()
        .map_err(|e| McpError::invalid_params(format!("invalid node id '{s}': {e}"), None))
}

fn json_result(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct ArcParam {
    /// Arc label, unique within the node
    label: String,
    /// Value literal: `@<node id>` references a node, numbers are numbers,
    /// anything else is text
    value: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddIdeaRequest {
    /// Idea title
    title: String,
    /// Optional free-text body
    content: Option<String>,
    /// Optional tags (normalised to lower case)
    tags: Option<Vec<String>>,
    /// Energy level from 1 to 5 (default 1)
    energy: Option<u8>,
    /// Optional structured arcs. Without arcs the idea is a leaf named by its title.
    arcs: Option<Vec<ArcParam>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IdRequest {
    /// Node or idea id
    id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UnifyRequest {
    /// First node; the result is materialized from this side
    id1: String,
    /// Second node
    id2: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DiscoverRequest {
    /// Target idea id
    id: String,
    /// Maximum number of candidates (defaults to the configured limit)
    limit: Option<usize>,
    /// Persist the returned candidates as relations
    save: Option<bool>,
}

#[tool_router]
impl IgServer {
    #[tool(
        description = "Author a new idea. Returns its id. Give arcs to make it a structured (complex) node; otherwise it is a leaf that only unifies with a same-titled leaf."
    )]
    async fn ig_add_idea(
        &self,
        Parameters(req): Parameters<AddIdeaRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ws = self.state.lock().await;

        let mut arcs = Vec::new();
        for arc in req.arcs.unwrap_or_default() {
            let value = ArcValue::parse_literal(arc.value.trim()).map_err(|e| {
                McpError::invalid_params(format!("arc '{}': {e}", arc.label), None)
            })?;
            arcs.push(ig_core::Arc::new(&arc.label, value));
        }

        let mut idea = Idea::new(ws.owner(), &req.title)
            .with_tags(&req.tags.unwrap_or_default())
            .with_energy(req.energy.unwrap_or(1));
        if let Some(content) = &req.content {
            idea = idea.with_content(content);
        }

        let id = ws.store().author_idea(idea, arcs).map_err(core_error)?;
        let node = ws.store().require(id).map_err(core_error)?;

        Ok(json_result(&serde_json::json!({
            "id": id,
            "node_type": node.node_type.as_str(),
            "arcs": node.arc_list.len(),
        })))
    }

    #[tool(
        description = "Show a node: its arcs, complement arcs, forward reference, materialized copy, generation, the idea it belongs to (if any) and its forward chain to the canonical node."
    )]
    async fn ig_show(
        &self,
        Parameters(req): Parameters<IdRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        let ws = self.state.lock().await;
        let store = ws.store();

        let node = store.require(id).map_err(core_error)?;
        let idea = store.get_idea(id).map_err(core_error)?;
        let chain: Vec<NodeId> = Unifier::new(store)
            .forward_chain(id)
            .map_err(core_error)?
            .iter()
            .map(|n| n.id)
            .collect();

        Ok(json_result(&serde_json::json!({
            "node": node,
            "idea": idea,
            "chain": chain,
        })))
    }

    #[tool(
        description = "Unify two nodes without discarding information. Returns the id of the materialized result, the canonical node and every forward reference written. Fails if two leaves with different names meet; work done before the failure is kept."
    )]
    async fn ig_unify(
        &self,
        Parameters(req): Parameters<UnifyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id1 = parse_id(&req.id1)?;
        let id2 = parse_id(&req.id2)?;
        let ws = self.state.lock().await;

        let result = Unifier::new(ws.store())
            .unify(id1, id2)
            .map_err(core_error)?;

        Ok(json_result(&serde_json::json!({
            "result_node_id": result.result_node_id,
            "canonical_id": result.canonical_id,
            "merged": result.merged(),
            "forwarded": result.forwarded,
        })))
    }

    #[tool(
        description = "Find ideas similar to the given idea, strongest first, scored on title, content, tags and energy. Archived ideas are skipped. Returns an empty list when nothing clears the threshold."
    )]
    async fn ig_discover(
        &self,
        Parameters(req): Parameters<DiscoverRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_id(&req.id)?;
        let ws = self.state.lock().await;
        let store = ws.store();

        let mut config = ws.config().discovery;
        if let Some(limit) = req.limit {
            config.limit = limit;
        }
        let found = config.cap(discover_relations(store, id, &config));

        if req.save.unwrap_or(false) {
            if let Err(e) = store.save_relations(id, &found) {
                tracing::error!("failed to persist relations: {e}");
            }
        }

        let candidates: Vec<serde_json::Value> = found
            .iter()
            .map(|c| {
                let title = store
                    .get_idea(c.id)
                    .ok()
                    .flatten()
                    .map(|i| i.title)
                    .unwrap_or_default();
                serde_json::json!({
                    "id": c.id,
                    "strength": c.strength,
                    "title": title,
                })
            })
            .collect();

        Ok(json_result(&serde_json::json!({
            "threshold": config.threshold,
            "candidates": candidates,
        })))
    }

    #[tool(
        description = "Get idea graph statistics: node, idea and archived counts, superseded and materialized nodes, saved relations."
    )]
    async fn ig_stats(&self) -> Result<CallToolResult, McpError> {
        let ws = self.state.lock().await;
        let stats = ws
            .store()
            .stats()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let mut json = serde_json::to_value(&stats)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json["owner"] = serde_json::json!(ws.owner());
        Ok(json_result(&json))
    }
}

#[tool_handler]
impl ServerHandler for IgServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Idea graph: a store of ideas that can be merged without losing information.\n\n\
                 WORKFLOW:\n\
                 1. CAPTURE: call ig_add_idea for each idea. Add arcs when an idea has structure \
                    (label=value pairs, @id to point at another node).\n\
                 2. RELATE: call ig_discover on an idea to find similar ones.\n\
                 3. MERGE: call ig_unify on a pair worth merging. Both inputs stay readable; \
                    the result is a new node carrying the union of their structure.\n\
                 4. INSPECT: call ig_show to follow forward references and see what was merged.\n\n\
                 Unifying two leaves with different names fails; that is an answer, not an error to retry."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
