//! Conversational expense agent
//!
//! Runs the tool-calling loop: send the conversation plus tool
//! definitions, execute whatever tools the model asks for against the
//! caller's data, feed the results back, and repeat until the model
//! answers in plain text or the iteration cap trips.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::categories::categories_for_prompt;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::tools::{agent_tools, execute_tool};

use super::anthropic_compat::{AnthropicCompatBackend, ContentBlock, Message};

const MAX_ITERATIONS: usize = 5;

/// Shown when the model produces no usable answer
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't answer that. Try asking about a merchant, category, or your total spending.";

/// Record of one tool execution during a conversation turn
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: Value,
    pub success: bool,
    pub output: String,
}

/// Outcome of one agent turn
#[derive(Debug)]
pub struct AgentResult {
    /// Final text answer
    pub response: String,
    /// Full message list including this turn, for session storage
    pub messages: Vec<Message>,
    /// Tools executed along the way
    pub tool_calls: Vec<ToolCallRecord>,
    /// Model round trips used
    pub iterations: usize,
}

/// Tool-calling agent over a user's receipts
#[derive(Clone)]
pub struct ExpenseAgent {
    backend: AnthropicCompatBackend,
    db: Database,
    max_iterations: usize,
}

impl ExpenseAgent {
    pub fn new(backend: AnthropicCompatBackend, db: Database) -> Self {
        Self {
            backend,
            db,
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn model(&self) -> String {
        self.backend.model()
    }

    fn system_prompt() -> String {
        format!(
            "You are an expense assistant answering questions about the user's \
             stored receipts. Use the provided tools to look up spending data; \
             never invent figures, merchants, or dates. If the tools return no \
             matching data, say so plainly. Amounts are in the user's local \
             currency. Spending categories: {}.",
            categories_for_prompt()
        )
    }

    /// Answer a question, continuing from prior conversation history
    ///
    /// The user identity is bound here and passed to every tool
    /// execution; nothing the model sends can redirect a query at
    /// another user's data.
    pub async fn answer(
        &self,
        question: &str,
        user_email: &str,
        history: Vec<Message>,
    ) -> Result<AgentResult> {
        let mut conversation = history;
        conversation.push(Message::user(question));

        let mut messages = conversation.clone();
        let mut tool_calls = Vec::new();

        for iteration in 0..self.max_iterations {
            let response = self
                .backend
                .messages(messages.clone(), Some(Self::system_prompt()), Some(agent_tools()))
                .await?;

            debug!(
                iteration,
                stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Agent model round trip"
            );

            let uses: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if uses.is_empty() {
                let text = response.text();
                let answer = if text.trim().is_empty() {
                    warn!("Agent returned no text, using fallback answer");
                    FALLBACK_ANSWER.to_string()
                } else {
                    text
                };

                conversation.push(Message::assistant(&answer));
                info!(
                    iterations = iteration + 1,
                    tools = tool_calls.len(),
                    "Agent answered"
                );
                return Ok(AgentResult {
                    response: answer,
                    messages: conversation,
                    tool_calls,
                    iterations: iteration + 1,
                });
            }

            messages.push(Message::assistant_blocks(response.content.clone()));

            let mut results = Vec::with_capacity(uses.len());
            for (id, name, input) in uses {
                match execute_tool(&self.db, user_email, &name, &input) {
                    Ok(output) => {
                        debug!(tool = %name, "Tool succeeded");
                        results.push(ContentBlock::tool_result(&id, &output));
                        tool_calls.push(ToolCallRecord {
                            name,
                            input,
                            success: true,
                            output,
                        });
                    }
                    Err(e) => {
                        warn!(tool = %name, error = %e, "Tool failed");
                        let message = e.to_string();
                        results.push(ContentBlock::tool_error(&id, &message));
                        tool_calls.push(ToolCallRecord {
                            name,
                            input,
                            success: false,
                            output: message,
                        });
                    }
                }
            }

            messages.push(Message::tool_results(results));
        }

        Err(Error::InvalidData(format!(
            "Max iterations ({}) reached without completion",
            self.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockModelServer;

    fn test_db() -> Database {
        Database::in_memory().expect("in-memory db")
    }

    fn text_response(text: &str) -> Value {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "llama3.2",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    fn tool_use_response(name: &str, input: Value) -> Value {
        serde_json::json!({
            "id": "msg_2",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "tool_use", "id": "tu_1", "name": name, "input": input}
            ],
            "model": "llama3.2",
            "stop_reason": "tool_use",
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn test_direct_text_answer() {
        let server = MockModelServer::start(vec![text_response("You spent $40 at delis.")]).await;
        let agent = ExpenseAgent::new(
            AnthropicCompatBackend::new(&server.url(), "llama3.2"),
            test_db(),
        );

        let result = agent
            .answer("How much at delis?", "test@example.com", Vec::new())
            .await
            .unwrap();

        assert_eq!(result.response, "You spent $40 at delis.");
        assert_eq!(result.iterations, 1);
        assert!(result.tool_calls.is_empty());
        // Question and answer both land in the stored conversation
        assert_eq!(result.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let server = MockModelServer::start(vec![
            tool_use_response("get_total_spend", serde_json::json!({})),
            text_response("You have no recorded spending."),
        ])
        .await;
        let agent = ExpenseAgent::new(
            AnthropicCompatBackend::new(&server.url(), "llama3.2"),
            test_db(),
        );

        let result = agent
            .answer("What did I spend?", "test@example.com", Vec::new())
            .await
            .unwrap();

        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "get_total_spend");
        assert!(result.tool_calls[0].success);
        assert!(result.tool_calls[0].output.contains("\"receipt_count\":0"));
    }

    #[tokio::test]
    async fn test_failed_tool_is_recorded_and_loop_continues() {
        let server = MockModelServer::start(vec![
            tool_use_response("no_such_tool", serde_json::json!({})),
            text_response("I could not look that up."),
        ])
        .await;
        let agent = ExpenseAgent::new(
            AnthropicCompatBackend::new(&server.url(), "llama3.2"),
            test_db(),
        );

        let result = agent
            .answer("Hm?", "test@example.com", Vec::new())
            .await
            .unwrap();

        assert_eq!(result.tool_calls.len(), 1);
        assert!(!result.tool_calls[0].success);
        assert_eq!(result.response, "I could not look that up.");
    }

    #[tokio::test]
    async fn test_empty_answer_uses_fallback() {
        let server = MockModelServer::start(vec![text_response("  ")]).await;
        let agent = ExpenseAgent::new(
            AnthropicCompatBackend::new(&server.url(), "llama3.2"),
            test_db(),
        );

        let result = agent
            .answer("Anything?", "test@example.com", Vec::new())
            .await
            .unwrap();
        assert_eq!(result.response, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_max_iterations_errors() {
        // Every round trip asks for another tool call
        let responses = (0..6)
            .map(|_| tool_use_response("get_total_spend", serde_json::json!({})))
            .collect();
        let server = MockModelServer::start(responses).await;
        let agent = ExpenseAgent::new(
            AnthropicCompatBackend::new(&server.url(), "llama3.2"),
            test_db(),
        );

        let err = agent
            .answer("Loop forever", "test@example.com", Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Max iterations"));
    }
}
