//! Server configuration.
//!
//! Loaded from an optional TOML file, then overridden by CLI flags and
//! environment variables (see [`crate::cli::Cli`]). Example:
//!
//! ```toml
//! [neo4j]
//! uri = "bolt://localhost:7687"
//! username = "neo4j"
//! password = "secret"
//! database = "neo4j"
//!
//! [log]
//! filter = "neo4j_mcp=debug"
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::error::McpError;

pub const DEFAULT_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_USERNAME: &str = "neo4j";
pub const DEFAULT_DATABASE: &str = "neo4j";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Connection settings for the graph store.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: Option<String>,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            max_connections: 16,
            fetch_size: 500,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

impl Neo4jConfig {
    /// The password, or a startup error when none was configured.
    pub fn require_password(&self) -> Result<&str, McpError> {
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => Err(McpError::Startup(
                "no Neo4j password configured (set NEO4J_PASSWORD, --password or [neo4j].password)"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub neo4j: Neo4jConfig,
    pub log: LogConfig,
}

impl ServerConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
