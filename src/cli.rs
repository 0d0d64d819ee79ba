//! Command-line argument parsing for Samarth.
//!
//! CLI flags take precedence over environment variables and the config file.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// AI-powered agricultural data analytics API.
#[derive(Parser, Debug, Default)]
#[command(name = "samarth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", env = "SAMARTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Store URL (sqlite:..., postgres://..., or "mock")
    #[arg(short = 'd', long, value_name = "URL")]
    pub database_url: Option<String>,

    /// LLM provider: gemini, openai or mock
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Model name passed to the provider
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies CLI flags over an already-loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(provider) = &self.llm {
            config.llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }
    }
}
