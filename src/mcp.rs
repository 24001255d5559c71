use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{engine::Engine, error};

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// MCP stdio server exposing the retrieval surface of a running engine.
///
/// Read-only: reindexing keeps running in the background while tools are
/// being served.
#[derive(Clone)]
pub struct SemdexMcpServer {
    engine: Engine,
    tool_router: ToolRouter<Self>,
}

impl SemdexMcpServer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl SemdexMcpServer {
    /// Rank indexed document chunks against a natural-language query.
    #[tool(
        name = "semdex_search",
        description = "Semantic search over the indexed documents. Returns the best-matching chunks with similarity scores."
    )]
    pub async fn semdex_search(
        &self,
        params: Parameters<SearchToolParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

        let hits = self
            .engine
            .search(&params.query, limit)
            .await
            .map_err(|e| mcp_error("search failed", e))?;

        let summary = format_search_summary(&hits, &params.query);
        let structured = serde_json::to_value(SearchResponse {
            query: params.query,
            result_count: hits.len(),
            results: hits,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Build the numbered citation block for a chat prompt.
    #[tool(
        name = "semdex_context",
        description = "Build a citation-style context block from the three most relevant document chunks."
    )]
    pub async fn semdex_context(
        &self,
        params: Parameters<ContextToolParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let context = self
            .engine
            .build_context(&params.0.query)
            .await
            .map_err(|e| mcp_error("context build failed", e))?;

        let text = context.unwrap_or_else(|| "No documents are indexed.".to_string());
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for SemdexMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        let mut server_info =
            Implementation::new("semdex", env!("CARGO_PKG_VERSION"));
        server_info.title = Some("semdex MCP".to_string());
        info.server_info = server_info;
        info.instructions = Some(
            "Use semdex_search to find document chunks by meaning. Use semdex_context to get a ready-made citation block for answering from the documents."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchToolParams {
    /// Natural-language search query.
    pub query: String,
    /// Maximum number of results (default: 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextToolParams {
    /// Natural-language query to build context for.
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    result_count: usize,
    results: Vec<crate::search::SearchHit>,
}

fn format_search_summary(
    hits: &[crate::search::SearchHit],
    query: &str,
) -> String {
    if hits.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(hits.len() + 1);
    let suffix = if hits.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{suffix} for \"{query}\":",
        hits.len()
    ));

    for hit in hits {
        lines.push(format!("{:.3} {}", hit.score, hit.document));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

/// Serve MCP over stdio until the client disconnects.
pub async fn run_mcp(engine: Engine) -> error::Result<()> {
    let server = SemdexMcpServer::new(engine);
    let transport = rmcp::transport::stdio();

    let running = server.serve(transport).await.map_err(|e| {
        error::Error::Config(format!("MCP server initialization failed: {e}"))
    })?;
    running
        .waiting()
        .await
        .map_err(|e| error::Error::Config(format!("MCP server error: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        embedder::{Embedder, EmbeddingKind},
        engine::EngineConfig,
    };

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        async fn embed(
            &self,
            texts: &[String],
            _kind: EmbeddingKind,
        ) -> error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn search_tool_returns_structured_results() {
        let engine =
            Engine::new(Arc::new(FlatEmbedder), EngineConfig::default()).unwrap();
        engine
            .reindex("notes/rust.md", "Rust is fast. Ownership keeps memory safe.")
            .await
            .unwrap();

        let server = SemdexMcpServer::new(engine);
        let params = SearchToolParams {
            query: "Rust".to_string(),
            limit: Some(5),
        };

        let result = server
            .semdex_search(Parameters(params))
            .await
            .unwrap();

        let structured = result.structured_content.expect("structured");
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].get("document").and_then(|v| v.as_str()),
            Some("notes/rust.md")
        );

        let summary = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert!(summary.contains("Found 1 result"));
    }

    #[tokio::test]
    async fn context_tool_reports_empty_index() {
        let engine =
            Engine::new(Arc::new(FlatEmbedder), EngineConfig::default()).unwrap();
        let server = SemdexMcpServer::new(engine);

        let result = server
            .semdex_context(Parameters(ContextToolParams {
                query: "anything".to_string(),
            }))
            .await
            .unwrap();

        let text = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert_eq!(text, "No documents are indexed.");
    }
}
