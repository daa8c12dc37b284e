//! LLM backend abstraction
//!
//! Two layers of model access live here. Plain completions (used by the
//! category classifier) go through the `LlmBackend` trait and the
//! `LlmClient` enum. The conversational agent instead talks the
//! Anthropic-compatible Messages protocol in `anthropic_compat`, which
//! carries tool definitions and tool results.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OLLAMA_HOST`: Ollama server URL. Default: http://localhost:11434
//! - `OLLAMA_MODEL`: Model for completions. Default: llama3.2
//! - `ANTHROPIC_COMPATIBLE_HOST`: Messages-protocol server URL (agent)
//! - `ANTHROPIC_COMPATIBLE_MODEL`: Model for the agent

pub mod agent;
pub mod anthropic_compat;
mod mock;
mod ollama;
pub mod parsing;

pub use agent::{AgentResult, ExpenseAgent, ToolCallRecord};
pub use anthropic_compat::AnthropicCompatBackend;
pub use mock::MockLlmBackend;
pub use ollama::OllamaBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for completion backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send a prompt and get the full completion text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name being used
    fn model(&self) -> String;

    /// Get the host/endpoint being used
    fn host(&self) -> String;
}

/// Concrete LLM client enum
///
/// Using an enum instead of Box<dyn LlmBackend> gives us Clone and
/// avoids dynamic dispatch overhead.
#[derive(Clone)]
pub enum LlmClient {
    /// Ollama backend
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockLlmBackend),
}

impl LlmClient {
    /// Create a client from environment variables
    pub fn from_env() -> Self {
        LlmClient::Ollama(OllamaBackend::from_env())
    }

    /// Create a mock client for testing
    pub fn mock() -> Self {
        LlmClient::Mock(MockLlmBackend::new())
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self {
            LlmClient::Ollama(b) => b.complete(prompt).await,
            LlmClient::Mock(b) => b.complete(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            LlmClient::Ollama(b) => b.health_check().await,
            LlmClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> String {
        match self {
            LlmClient::Ollama(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> String {
        match self {
            LlmClient::Ollama(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}
