//! # neo4j-mcp
//!
//! Model Context Protocol server for Neo4j. AI agents query and modify a
//! property graph through a fixed set of tools.
//!
//! ## Key Features
//!
//! - **Safe query building**: labels and relationship types are checked
//!   against an identifier allow-list, every value travels as a parameter
//! - **Plain JSON results**: nodes, relationships and paths come back as
//!   plain objects; large integers never lose precision
//! - **Scoped sessions**: every tool call runs in its own transaction,
//!   released on every exit path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neo4j_mcp::{mcp::tools, Neo4jStore, ServerConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let store = Neo4jStore::connect(&config.neo4j, "secret").await?;
//!
//! let result = tools::call_tool(
//!     &store,
//!     "execute_cypher",
//!     Some(&json!({"query": "MATCH (n:Person) RETURN n LIMIT $n", "params": {"n": 5}})),
//! )
//! .await?;
//! // Returns: {"toolResult": [{"n": {"id": ..., "labels": ["Person"], ...}}]}
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod mcp;
pub mod store;

// Re-exports for convenience
pub use config::{Neo4jConfig, ServerConfig};
pub use error::{McpError, Result};
pub use graph::{
    CypherQuery, GraphNode, GraphPath, GraphRelationship, RawValue, SchemaSummary,
};
pub use mcp::McpServer;
pub use store::{GraphStore, Neo4jStore, StoreError};
