//! Command-line interface for the neo4j-mcp server.
//!
//! Every connection flag also reads an environment variable, so MCP hosts
//! that only pass an environment block can configure the server.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "neo4j-mcp")]
#[command(about = "Model Context Protocol server for Neo4j", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Optional TOML config file
    #[arg(short, long, env = "NEO4J_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bolt URI of the Neo4j server
    #[arg(long, env = "NEO4J_URI")]
    pub uri: Option<String>,

    /// Neo4j user name
    #[arg(short, long, env = "NEO4J_USERNAME")]
    pub username: Option<String>,

    /// Neo4j password
    #[arg(short, long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name
    #[arg(short, long, env = "NEO4J_DATABASE")]
    pub database: Option<String>,

    /// Log filter (RUST_LOG takes precedence)
    #[arg(long)]
    pub log: Option<String>,
}

impl Cli {
    /// Load the config file (if any) and apply flag overrides on top.
    pub fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut ServerConfig) {
        if let Some(uri) = &self.uri {
            config.neo4j.uri = uri.clone();
        }
        if let Some(username) = &self.username {
            config.neo4j.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.neo4j.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            config.neo4j.database = database.clone();
        }
        if let Some(filter) = &self.log {
            config.log.filter = filter.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let mut config = ServerConfig::parse(
            "[neo4j]\nuri = \"bolt://file:7687\"\npassword = \"from-file\"\n",
        )
        .unwrap();
        let cli = Cli::parse_from([
            "neo4j-mcp",
            "--uri",
            "bolt://flag:7687",
            "--database",
            "movies",
        ]);
        cli.apply(&mut config);

        assert_eq!(config.neo4j.uri, "bolt://flag:7687");
        assert_eq!(config.neo4j.database, "movies");
        assert_eq!(config.neo4j.password.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
