//! MCP (Model Context Protocol) server module.
//!
//! Provides a JSON-RPC 2.0 over STDIO interface through which AI agents
//! query and modify a Neo4j graph.

pub mod prompts;
pub mod resources;
pub mod server;
pub mod tools;
pub mod types;

pub use server::McpServer;
