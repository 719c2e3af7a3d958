//! Application configuration management.

use std::collections::HashMap;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Bearer token to account id mapping.
    #[serde(default)]
    pub directory: Vec<DirectoryEntry>,
}

/// One token to account id binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    /// Authorization header value.
    pub token: String,
    /// Wallet account id the token resolves to.
    pub account_id: String,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    /// Deadline for a single trade in milliseconds; unset means no deadline.
    pub trade_timeout_ms: Option<u64>,
}

impl LedgerConfig {
    /// The trade deadline, if any.
    #[must_use]
    pub fn trade_timeout(&self) -> Option<Duration> {
        self.trade_timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `WALLET__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("WALLET").separator("__"));

        Self::from_builder(builder)
    }

    /// Builds configuration from an already assembled set of sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources fail to load or do not deserialize.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// The directory as a token to account id table; later entries win.
    #[must_use]
    pub fn directory_table(&self) -> HashMap<String, String> {
        self.directory
            .iter()
            .map(|entry| (entry.token.clone(), entry.account_id.clone()))
            .collect()
    }

    /// Address the server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
