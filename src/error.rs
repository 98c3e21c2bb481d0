//! Error types for the Neo4j MCP adapter.
//!
//! Every failure surfaced to an MCP client maps to exactly one variant with a
//! stable message prefix, so callers can tell bad input from store failures.

use thiserror::Error;

use crate::store::StoreError;

/// Errors raised while serving a tool call, resource read or prompt.
#[derive(Debug, Error)]
pub enum McpError {
    /// Caller-supplied arguments do not match the tool's declared shape.
    #[error("Invalid arguments for {tool}: {message}")]
    Validation { tool: String, message: String },

    /// The tool name is not part of the registered catalogue.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The graph store rejected or failed the query.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Fatal configuration or connectivity problem at process start.
    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// The URI matches a resource template but its variable is not usable.
    #[error("Invalid resource {uri}: {message}")]
    InvalidResource { uri: String, message: String },

    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("Invalid arguments for prompt {prompt}: {message}")]
    InvalidPromptArguments { prompt: String, message: String },
}

impl McpError {
    pub fn validation(tool: &str, message: impl Into<String>) -> Self {
        McpError::Validation {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error was detected before the graph store was touched.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            McpError::Validation { .. }
                | McpError::UnknownTool(_)
                | McpError::UnknownResource(_)
                | McpError::InvalidResource { .. }
                | McpError::UnknownPrompt(_)
                | McpError::InvalidPromptArguments { .. }
        )
    }
}

impl From<StoreError> for McpError {
    fn from(err: StoreError) -> Self {
        McpError::ToolExecution(err.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, McpError>;
