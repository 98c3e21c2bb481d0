//! neo4j-mcp: Model Context Protocol server for Neo4j.
//!
//! Runs a JSON-RPC 2.0 server over STDIO that exposes a Neo4j database
//! through MCP tools, resources and prompts.
//!
//! Usage:
//!   neo4j-mcp [--config FILE] [--uri URI] [--username USER] [--database DB]
//!
//! The password comes from `NEO4J_PASSWORD`, `--password` or the config file.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use neo4j_mcp::cli::Cli;
use neo4j_mcp::mcp::server;
use neo4j_mcp::{GraphStore, McpError, Neo4jStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve().context("failed to load configuration")?;

    // Tracing goes to stderr (MCP uses stdout for protocol)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .init();

    info!(config = ?config.neo4j, "neo4j-mcp starting");

    let store = match connect(&config.neo4j).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "startup failed");
            return Err(e.into());
        }
    };

    let served = server::run(store.clone()).await;

    store.close().await;
    served.context("stdio transport failed")?;
    Ok(())
}

/// Build the driver and make sure the database answers.
async fn connect(config: &neo4j_mcp::Neo4jConfig) -> Result<Neo4jStore, McpError> {
    let password = config.require_password()?;
    let store = Neo4jStore::connect(config, password)
        .await
        .map_err(|e| McpError::Startup(e.to_string()))?;
    store
        .verify_connectivity()
        .await
        .map_err(|e| McpError::Startup(e.to_string()))?;
    info!(uri = %config.uri, database = %config.database, "connected to neo4j");
    Ok(store)
}
