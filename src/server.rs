//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Both entry points open one [`Engine`] and share it between every client
//! session.

use crate::config::RelfsConfig;
use crate::engine::Engine;
use crate::tools::RelfsTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Open the stores and build the indexes. Runs on the blocking pool because
/// startup replays every relation.
async fn open_engine(config: RelfsConfig) -> Result<Arc<Engine>> {
    let engine = tokio::task::spawn_blocking(move || Engine::open(config)).await??;
    let stats = engine.stats()?;
    tracing::info!(
        relations = stats.active_relations,
        path_bindings = stats.path_bindings,
        "engine ready"
    );
    Ok(Arc::new(engine))
}

/// Start the server with the transport named in `server.transport`.
pub async fn serve(config: RelfsConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "stdio" => serve_stdio(config).await,
        "sse" | "http" => serve_sse(config).await,
        other => anyhow::bail!("unknown transport `{other}` (expected stdio or sse)"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: RelfsConfig) -> Result<()> {
    tracing::info!("starting relfs MCP server on stdio");

    let engine = open_engine(config).await?;
    let tools = RelfsTools::new(engine);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: RelfsConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting relfs MCP server on SSE/HTTP");

    let engine = open_engine(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(RelfsTools::new(Arc::clone(&engine))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    Ok(())
}
