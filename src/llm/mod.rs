//! LLM integration for Samarth.
//!
//! Provides the model client trait, provider implementations, the SQL tool
//! the model may call, and prompt assembly.

pub mod extract;
pub mod factory;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod tools;
pub mod types;

pub use factory::create_client;
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt::{build_system_instruction, PromptCache};
pub use tools::{SqlTool, ToolDefinition, SQL_TOOL_NAME};
pub use types::{Conversation, ModelResponse, Role, ToolCall, ToolResult, Turn};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// Trait for model clients that support tool calling.
///
/// Implementations must be thread-safe (Send + Sync) so one client can be
/// shared by every request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends the conversation and returns either final text or tool calls.
    async fn generate(
        &self,
        system_instruction: &str,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse>;

    /// Returns the configured model name.
    fn model_name(&self) -> &str;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI chat completions
    OpenAi,
    /// Offline mock client (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Mock => None,
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
