//! Anthropic-compatible Messages API client
//!
//! The conversational agent needs tool calling, which the plain generate
//! API does not carry. This client speaks the Messages protocol against
//! any compatible server (Ollama's compat layer included): structured
//! content blocks, tool definitions, tool results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

/// Message content, either plain text or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A content block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Message {
    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.to_string()),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(text.to_string()),
        }
    }

    /// Assistant message carrying structured blocks (echoed tool calls)
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }

    /// User message carrying tool results
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Blocks(blocks),
        }
    }
}

impl ContentBlock {
    pub fn text(text: &str) -> Self {
        ContentBlock::Text {
            text: text.to_string(),
        }
    }

    pub fn tool_result(tool_use_id: &str, content: &str) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: content.to_string(),
            is_error: None,
        }
    }

    pub fn tool_error(tool_use_id: &str, content: &str) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: content.to_string(),
            is_error: Some(true),
        }
    }
}

/// A tool the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Request body for the Messages endpoint
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

/// Response from the Messages endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub response_type: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// True once the model stopped on its own (not to call a tool)
    pub fn is_complete(&self) -> bool {
        matches!(self.stop_reason.as_deref(), Some("end_turn") | Some("stop_sequence"))
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// All tool calls in the response as (id, name, input)
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Client for an Anthropic-compatible Messages endpoint
#[derive(Clone)]
pub struct AnthropicCompatBackend {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnthropicCompatBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment with defaults
    ///
    /// Reads ANTHROPIC_COMPATIBLE_HOST and ANTHROPIC_COMPATIBLE_MODEL,
    /// falling back to the local Ollama defaults.
    pub fn from_env() -> Self {
        let host = std::env::var("ANTHROPIC_COMPATIBLE_HOST")
            .unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let model = std::env::var("ANTHROPIC_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(&host, &model)
    }

    pub fn model(&self) -> String {
        self.model.clone()
    }

    pub fn host(&self) -> String {
        self.base_url.clone()
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Send a Messages request with the default token budget
    pub async fn messages(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
    ) -> Result<MessagesResponse> {
        self.messages_with_max_tokens(messages, system, tools, DEFAULT_MAX_TOKENS)
            .await
    }

    pub async fn messages_with_max_tokens(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
        max_tokens: u32,
    ) -> Result<MessagesResponse> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            messages,
            system,
            tools,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", "ollama")
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "Messages endpoint returned status {}: {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }

    /// One-shot text completion through the Messages protocol
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.messages(vec![Message::user(prompt)], None, None).await?;
        Ok(response.text())
    }

    pub async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_serialization() {
        let block = ContentBlock::tool_result("tu_1", "42");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "tu_1");
        assert!(json.get("is_error").is_none());

        let block = ContentBlock::tool_error("tu_2", "boom");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["is_error"], true);
    }

    #[test]
    fn test_message_content_untagged() {
        let text: MessageContent = serde_json::from_str(r#""hello""#).unwrap();
        assert!(matches!(text, MessageContent::Text(_)));

        let blocks: MessageContent =
            serde_json::from_str(r#"[{"type": "text", "text": "hi"}]"#).unwrap();
        assert!(matches!(blocks, MessageContent::Blocks(_)));
    }

    #[test]
    fn test_response_tool_uses() {
        let json = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "tu_1", "name": "get_total_spend", "input": {"year": 2024}}
            ],
            "model": "llama3.2",
            "stop_reason": "tool_use",
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();

        assert!(!response.is_complete());
        assert!(response.has_tool_use());
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "get_total_spend");
        assert_eq!(response.text(), "Let me check.");
    }

    #[test]
    fn test_end_turn_is_complete() {
        let json = r#"{
            "id": "msg_2",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Done."}],
            "model": "llama3.2",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_complete());
        assert!(!response.has_tool_use());
    }
}
