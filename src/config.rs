//! Runtime configuration.
//!
//! Which store to write to, which schema objects to declare, and how the
//! batch loader treats failures. Loadable from JSON or from the `NEO4J_*`
//! environment variables the dataset scripts use.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::Layer;
use crate::index::IndexTier;
use crate::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Layers whose constraints are declared. `None` = all layers.
    #[serde(default)]
    pub constraint_layers: Option<Vec<Layer>>,
    #[serde(default = "default_index_tiers")]
    pub index_tiers: Vec<IndexTier>,
    /// Stop a batch load at the first failing item.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_index_tiers() -> Vec<IndexTier> {
    IndexTier::DEFAULT.to_vec()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            constraint_layers: None,
            index_tiers: default_index_tiers(),
            fail_fast: false,
        }
    }
}

/// Store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process store.
    #[default]
    Memory,
    /// A Cypher-speaking server reached through a caller-supplied session.
    Cypher(ConnectionConfig),
}

/// Connection settings for a Cypher server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_username() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

fn default_database() -> String {
    "neo4j".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            username: default_username(),
            password: default_password(),
            database: default_database(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

const URI_SCHEMES: &[&str] = &["bolt://", "bolt+s://", "bolt+ssc://", "neo4j://", "neo4j+s://", "neo4j+ssc://"];

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !URI_SCHEMES.iter().any(|s| self.uri.starts_with(s)) {
            return Err(Error::Config(format!("unsupported connection uri '{}'", self.uri)));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username is empty".into()));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database is empty".into()));
        }
        Ok(())
    }
}

impl GraphConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GraphConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Cypher backend settings from `NEO4J_URI`, `NEO4J_USERNAME`,
    /// `NEO4J_PASSWORD`, and `NEO4J_DATABASE`; unset variables take the
    /// defaults of a local development server.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `from_env` over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ConnectionConfig::default();
        let connection = ConnectionConfig {
            uri: lookup("NEO4J_URI").unwrap_or(defaults.uri),
            username: lookup("NEO4J_USERNAME").unwrap_or(defaults.username),
            password: lookup("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: lookup("NEO4J_DATABASE").unwrap_or(defaults.database),
        };
        let config = GraphConfig {
            backend: BackendConfig::Cypher(connection),
            ..GraphConfig::default()
        };
        config.validate()?;
        tracing::debug!(?config, "configuration loaded from environment");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let BackendConfig::Cypher(connection) = &self.backend {
            connection.validate()?;
        }
        Ok(())
    }

    pub fn constraint_layers(&self) -> Option<&[Layer]> {
        self.constraint_layers.as_deref()
    }
}
