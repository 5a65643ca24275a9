pub mod declare_relation;
pub mod delete_relation;
pub mod get_relation;
pub mod list_path;
pub mod read_path;
pub mod relation_stats;
pub mod search;

use declare_relation::DeclareRelationParams;
use delete_relation::DeleteRelationParams;
use get_relation::GetRelationParams;
use list_path::ListPathParams;
use read_path::ReadPathParams;
use relation_stats::{RebuildIndexParams, RelationStatsParams};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search::SearchParams;
use serde_json::json;
use std::sync::Arc;

use crate::engine::{DeclareRequest, Engine};
use crate::relations::{DeclareMode, RelationType};
use crate::search::QueryMode;
use crate::vfs::ReadView;

/// The relfs MCP tool handler. Every tool runs its engine call on the
/// blocking pool; the engine does its own locking.
#[derive(Clone)]
pub struct RelfsTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
}

impl RelfsTools {
    async fn blocking<T, F>(&self, what: &'static str, f: F) -> Result<T, String>
    where
        F: FnOnce(&Engine) -> crate::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| format!("{what} task failed: {e}"))?
            .map_err(|e| format!("{what} failed: {e}"))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl RelfsTools {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Create or update a relation; rule-spawned relations are returned too.
    #[tool(description = "Declare a relation (create, or update when the same type and key already exist). Types: Tool (key 'name'), Artifact (key 'name'), URLArtifact (key 'url'), MemorySession (needs 'agent'). Returns the relation and anything rules spawned from it.")]
    async fn declare_relation(
        &self,
        Parameters(params): Parameters<DeclareRelationParams>,
    ) -> Result<String, String> {
        let relation_type: RelationType = params.r#type.parse().map_err(|e| format!("{e}"))?;
        let mode = match params.mode.as_deref() {
            Some(m) => m.parse::<DeclareMode>().map_err(|e| format!("{e}"))?,
            None => DeclareMode::Merge,
        };

        tracing::info!(
            relation_type = %relation_type,
            properties = params.properties.len(),
            has_content = params.content.is_some(),
            "declare_relation called"
        );

        let mut request = DeclareRequest::new(relation_type, params.properties).with_mode(mode);
        if let Some(content) = params.content {
            request = request.with_content(content);
        }
        let outcome = self
            .blocking("declare", move |engine| engine.declare(request))
            .await?;
        to_json(&outcome)
    }

    #[tool(description = "Get a relation by ID, including soft-deleted ones. Optionally include its audit trail.")]
    async fn get_relation(
        &self,
        Parameters(params): Parameters<GetRelationParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "get_relation called");
        let with_history = params.history.unwrap_or(false);
        let id = params.id;
        let (relation, history) = self
            .blocking("lookup", move |engine| {
                let relation = engine.get(&id)?;
                let history = if with_history && relation.is_some() {
                    Some(engine.history(&id)?)
                } else {
                    None
                };
                Ok((relation, history))
            })
            .await?;

        match relation {
            Some(relation) => to_json(&json!({ "relation": relation, "history": history })),
            None => Ok(json!({ "relation": null, "found": false }).to_string()),
        }
    }

    #[tool(description = "Soft-delete a relation. It stays resolvable by ID but disappears from every path and from search. Re-declaring it revives it.")]
    async fn delete_relation(
        &self,
        Parameters(params): Parameters<DeleteRelationParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "delete_relation called");
        let id = params.id;
        let relation = self
            .blocking("delete", move |engine| engine.delete(&id))
            .await?;
        to_json(&json!({ "deleted": true, "relation": relation }))
    }

    /// List a virtual directory.
    #[tool(description = "List a virtual directory. Top level: /tools, /commands, /artifacts, /memory, /by-date, /by-agent.")]
    async fn list_path(
        &self,
        Parameters(params): Parameters<ListPathParams>,
    ) -> Result<String, String> {
        let path = params.path.unwrap_or_else(|| "/".to_string());
        tracing::debug!(path = %path, "list_path called");
        let for_result = path.clone();
        let entries = self
            .blocking("list", move |engine| engine.list(&path))
            .await?;

        match entries {
            Some(entries) => to_json(&json!({ "path": for_result, "entries": entries })),
            None => Ok(json!({ "path": for_result, "found": false, "entries": [] }).to_string()),
        }
    }

    #[tool(description = "Read a virtual file: its stored content (view 'content'), its properties as JSON (view 'info'), or whichever applies (view 'auto').")]
    async fn read_path(
        &self,
        Parameters(params): Parameters<ReadPathParams>,
    ) -> Result<String, String> {
        let view = match params.view.as_deref() {
            Some(v) => v.parse::<ReadView>().map_err(|e| format!("{e}"))?,
            None => ReadView::Auto,
        };
        tracing::debug!(path = %params.path, ?view, "read_path called");
        let path = params.path;
        let result = self
            .blocking("read", move |engine| engine.read(&path, view))
            .await?;

        let Some(result) = result else {
            return Ok(json!({ "found": false }).to_string());
        };
        let body = match result.text() {
            Some(text) => json!({ "content": text }),
            None => json!({ "binary": true, "size": result.bytes.len() }),
        };
        let mut response = json!({
            "path": result.path,
            "relation_id": result.relation.id,
            "view": result.view,
        });
        if let (Some(obj), Some(extra)) = (response.as_object_mut(), body.as_object()) {
            obj.extend(extra.clone());
        }
        to_json(&response)
    }

    #[tool(description = "Search relations by keywords. Modes: 'or' ranks by number of matching words, 'and' requires every word, 'phrase' requires the words in order.")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<String, String> {
        let mode = match params.mode.as_deref() {
            Some(m) => m.parse::<QueryMode>().map_err(|e| format!("{e}"))?,
            None => QueryMode::Or,
        };
        tracing::info!(query = %params.query, ?mode, "search called");

        let terms: Vec<String> = params.query.split_whitespace().map(str::to_string).collect();
        let limit = params.limit;
        let relevant_only = params.relevant_only.unwrap_or(false);
        let results = self
            .blocking("search", move |engine| {
                if relevant_only {
                    engine.search_relevant(&terms, mode, limit)
                } else {
                    engine.search(&terms, mode, limit)
                }
            })
            .await?;
        to_json(&json!({ "total": results.len(), "results": results }))
    }

    #[tool(description = "Discard the path and search indexes and rebuild them from the stored relations.")]
    async fn rebuild_index(
        &self,
        Parameters(params): Parameters<RebuildIndexParams>,
    ) -> Result<String, String> {
        tracing::info!("rebuild_index called");
        let include_paths = params.include_paths.unwrap_or(false);
        let (report, paths) = self
            .blocking("rebuild", move |engine| {
                let report = engine.rebuild_index()?;
                let paths = if include_paths {
                    Some(engine.path_snapshot()?)
                } else {
                    None
                };
                Ok((report, paths))
            })
            .await?;
        to_json(&json!({ "report": report, "paths": paths }))
    }

    #[tool(description = "Relation store statistics: counts by type, active vs deleted, spawned relations, path bindings, search documents, storage size.")]
    async fn relation_stats(
        &self,
        Parameters(params): Parameters<RelationStatsParams>,
    ) -> Result<String, String> {
        let filter = match params.r#type.as_deref() {
            Some(t) => Some(t.parse::<RelationType>().map_err(|e| format!("{e}"))?),
            None => None,
        };
        tracing::info!(?filter, "relation_stats called");

        let mut stats = self.blocking("stats", |engine| engine.stats()).await?;
        if let Some(ty) = filter {
            stats.by_type.retain(|name, _| name == ty.as_str());
        }
        to_json(&stats)
    }
}

#[tool_handler]
impl ServerHandler for RelfsTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "relfs stores tools, artifacts, URLs and agent sessions as relations and \
                 projects them as a virtual filesystem. Use declare_relation to record \
                 something, list_path and read_path to browse, and search to find it again."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
