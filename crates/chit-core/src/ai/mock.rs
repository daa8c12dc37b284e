//! Mock completion backend for testing
//!
//! Queued replies are served in order (repeating the last); with no
//! queue, a default guess is derived from keywords in the prompt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::LlmBackend;

/// Mock LLM backend with canned replies
#[derive(Clone)]
pub struct MockLlmBackend {
    replies: Arc<Vec<String>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl MockLlmBackend {
    /// Backend that pattern-matches the prompt for a plausible guess
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// Backend that always returns the given reply
    pub fn with_reply(reply: &str) -> Self {
        Self::with_replies(vec![reply.to_string()])
    }

    /// Backend that returns the given replies in order, then repeats the last
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Arc::new(replies),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// Backend whose completions always error
    pub fn failing() -> Self {
        Self {
            replies: Arc::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn default_reply(prompt: &str) -> String {
        let lower = prompt.to_lowercase();
        let (category, confidence) = if lower.contains("deli")
            || lower.contains("cafe")
            || lower.contains("restaurant")
        {
            ("Food & Beverage", 0.9)
        } else if lower.contains("market") || lower.contains("grocer") {
            ("Groceries", 0.85)
        } else if lower.contains("transit") || lower.contains("taxi") {
            ("Transport", 0.85)
        } else {
            ("Other", 0.5)
        };
        format!(r#"{{"category": "{}", "confidence": {}}}"#, category, confidence)
    }
}

impl Default for MockLlmBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmBackend for MockLlmBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::InvalidData("Mock backend failure".to_string()));
        }

        if self.replies.is_empty() {
            return Ok(Self::default_reply(prompt));
        }

        let index = call.min(self.replies.len() - 1);
        Ok(self.replies[index].clone())
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }

    fn model(&self) -> String {
        "mock".to_string()
    }

    fn host(&self) -> String {
        "mock://localhost".to_string()
    }
}
