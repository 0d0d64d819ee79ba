//! Configuration management for Samarth.
//!
//! Handles loading configuration from TOML files and environment variables,
//! covering the HTTP server, LLM provider, relational store, analytics loop
//! limits and logging.

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure for Samarth.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Relational store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Tool-call loop and history limits.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl ServerConfig {
    /// Returns the `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider: "gemini", "openai" or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name (e.g., "gemini-1.5-flash", "gpt-4o").
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Usually supplied through the environment instead.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds for a single model call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL: `sqlite:...`, `postgres://...` or `mock`.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Per-statement timeout in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Maximum rows returned to the model from a single statement.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Whether the SQL tool may run statements that modify data.
    #[serde(default)]
    pub allow_writes: bool,

    /// Whether to create and populate the demo tables when missing.
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_query_timeout() -> u64 {
    30
}

fn default_max_rows() -> usize {
    1000
}

fn default_seed_demo_data() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            query_timeout_secs: default_query_timeout(),
            max_rows: default_max_rows(),
            allow_writes: false,
            seed_demo_data: default_seed_demo_data(),
        }
    }
}

impl DatabaseConfig {
    /// Returns the connection URL with any password masked, safe for logs.
    pub fn display_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                if url.set_password(Some("****")).is_err() {
                    return url.scheme().to_string();
                }
                url.to_string()
            }
            Ok(_) => self.url.clone(),
            Err(_) => self.url.clone(),
        }
    }
}

/// Limits applied to a single analytics request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Maximum number of tool-call rounds before the analysis is abandoned.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Overall time budget for one analysis, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of results retained in the in-process history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    100
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            request_timeout_secs: default_request_timeout(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file, appended to in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("samarth")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ServiceError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies environment variables over file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    ///
    /// Split out from [`Config::apply_env_overrides`] so tests do not have to
    /// mutate the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ServiceError::config(format!("Invalid API_PORT '{port}'")))?;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("AI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        Ok(())
    }

    /// Checks cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.analytics.max_tool_rounds == 0 {
            return Err(ServiceError::config(
                "analytics.max_tool_rounds must be at least 1",
            ));
        }
        if self.analytics.history_capacity == 0 {
            return Err(ServiceError::config(
                "analytics.history_capacity must be at least 1",
            ));
        }
        if self.analytics.request_timeout_secs == 0 {
            return Err(ServiceError::config(
                "analytics.request_timeout_secs must be at least 1",
            ));
        }
        if self.database.max_rows == 0 {
            return Err(ServiceError::config("database.max_rows must be at least 1"));
        }
        Ok(())
    }
}
