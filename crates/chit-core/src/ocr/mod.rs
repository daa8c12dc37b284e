//! Pluggable OCR backend abstraction
//!
//! Mirrors the LLM client layering: an `OcrBackend` trait defines the
//! interface, and the `OcrClient` enum provides Clone + compile-time
//! dispatch over the concrete backends.
//!
//! # Configuration
//!
//! Environment variables:
//! - `CHIT_OCR_BACKEND`: Backend to use (azure, mock). Default: azure
//! - `AZURE_DI_ENDPOINT`: Azure Document Intelligence endpoint URL
//! - `AZURE_DI_KEY`: Azure Document Intelligence API key

mod azure;
mod mock;
pub mod types;

pub use azure::AzureOcrBackend;
pub use mock::{sample_analysis, MockOcrBackend};
pub use types::{OcrAnalysis, OcrLine, ReceiptDocument, ReceiptItem};

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for OCR backends
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Run receipt analysis over raw image bytes
    async fn analyze(&self, image: &[u8]) -> Result<OcrAnalysis>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Human-readable backend description (for logging)
    fn describe(&self) -> String;
}

/// Concrete OCR client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum OcrClient {
    /// Azure Document Intelligence prebuilt-receipt model
    Azure(AzureOcrBackend),
    /// Mock backend for testing
    Mock(MockOcrBackend),
}

impl OcrClient {
    /// Create an OCR client from environment variables
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("CHIT_OCR_BACKEND").unwrap_or_else(|_| "azure".to_string());

        match backend.to_lowercase().as_str() {
            "azure" => AzureOcrBackend::from_env().map(OcrClient::Azure),
            "mock" => Some(OcrClient::Mock(MockOcrBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown CHIT_OCR_BACKEND, falling back to azure");
                AzureOcrBackend::from_env().map(OcrClient::Azure)
            }
        }
    }

    /// Create a mock client for testing
    pub fn mock() -> Self {
        OcrClient::Mock(MockOcrBackend::new())
    }
}

#[async_trait]
impl OcrBackend for OcrClient {
    async fn analyze(&self, image: &[u8]) -> Result<OcrAnalysis> {
        match self {
            OcrClient::Azure(b) => b.analyze(image).await,
            OcrClient::Mock(b) => b.analyze(image).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            OcrClient::Azure(b) => b.health_check().await,
            OcrClient::Mock(b) => b.health_check().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            OcrClient::Azure(b) => b.describe(),
            OcrClient::Mock(b) => b.describe(),
        }
    }
}
