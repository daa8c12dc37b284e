//! Core library for Chit, a receipt expense tracker
//!
//! Everything behind the HTTP and CLI surfaces lives here: the OCR and
//! LLM backends, the extraction and classification pipeline, the
//! encrypted SQLite store, the spending query tools, and the
//! conversational agent that drives them.

pub mod ai;
pub mod categories;
pub mod classify;
pub mod db;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod tools;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AgentResult, AnthropicCompatBackend, ExpenseAgent, LlmBackend, LlmClient};
pub use db::Database;
pub use error::{Error, Result};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use models::{Classification, ExtractedReceipt, NewReceipt, ProcessedReceipt, ReceiptRecord};
pub use ocr::{OcrBackend, OcrClient};
pub use pipeline::ReceiptPipeline;
pub use session::{PipelineStage, SessionSnapshot, SessionTracker};
pub use store::ReceiptStore;
