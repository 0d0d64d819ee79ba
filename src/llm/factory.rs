//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{Result, ServiceError};
use crate::llm::{
    GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client from configuration.
///
/// For providers that require an API key, the key is resolved in order:
/// 1. `llm.api_key` from the configuration
/// 2. The provider's environment variable (`GEMINI_API_KEY` or `OPENAI_API_KEY`)
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    create_client_with(config, |name| std::env::var(name).ok())
}

/// Creates an LLM client, resolving environment variables through `lookup`.
pub fn create_client_with<F>(config: &LlmConfig, lookup: F) -> Result<Arc<dyn LlmClient>>
where
    F: Fn(&str) -> Option<String>,
{
    let provider: LlmProvider = config.provider.parse().map_err(ServiceError::config)?;

    let Some(key_var) = provider.api_key_var() else {
        return Ok(Arc::new(MockLlmClient::new()));
    };

    let key = config
        .api_key
        .clone()
        .or_else(|| lookup(key_var))
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            ServiceError::llm(format!("No API key configured. Set {}.", key_var))
        })?;

    tracing::debug!(
        provider = %provider,
        model = %config.model,
        timeout_secs = config.timeout_secs,
        "Creating LLM client"
    );

    match provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(
            GeminiConfig::new(key, &config.model).with_timeout(config.timeout_secs),
        )?)),
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(
            OpenAiConfig::new(key, &config.model).with_timeout(config.timeout_secs),
        )?)),
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}
