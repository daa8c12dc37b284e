//! Mock OCR backend for testing
//!
//! Serves queued analyses in order (repeating the last one once the
//! queue runs dry) and counts calls, so retry behavior is observable
//! from tests without a provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::{Error, Result};

use super::types::{OcrAnalysis, OcrLine, ReceiptDocument, ReceiptItem};
use super::OcrBackend;

/// Mock OCR backend with canned analyses
#[derive(Clone)]
pub struct MockOcrBackend {
    analyses: Arc<Vec<OcrAnalysis>>,
    calls: Arc<AtomicUsize>,
    healthy: bool,
}

impl MockOcrBackend {
    /// Backend that always returns the default sample analysis
    pub fn new() -> Self {
        Self::with_analysis(sample_analysis())
    }

    /// Backend that always returns the given analysis
    pub fn with_analysis(analysis: OcrAnalysis) -> Self {
        Self::with_analyses(vec![analysis])
    }

    /// Backend that returns the given analyses in order, then repeats the last
    pub fn with_analyses(analyses: Vec<OcrAnalysis>) -> Self {
        Self {
            analyses: Arc::new(analyses),
            calls: Arc::new(AtomicUsize::new(0)),
            healthy: true,
        }
    }

    /// Backend whose health check fails and whose analyze calls error
    pub fn unhealthy() -> Self {
        Self {
            analyses: Arc::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            healthy: false,
        }
    }

    /// Number of analyze calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOcrBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrBackend for MockOcrBackend {
    async fn analyze(&self, _image: &[u8]) -> Result<OcrAnalysis> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.healthy {
            return Err(Error::Ocr("Mock backend is unhealthy".to_string()));
        }

        let index = call.min(self.analyses.len().saturating_sub(1));
        self.analyses
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Ocr("Mock backend has no analyses".to_string()))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Default sample: one clean, high-confidence deli receipt
pub fn sample_analysis() -> OcrAnalysis {
    OcrAnalysis {
        content: "CORNER DELI\nSANDWICH 8.50\nCOFFEE 3.25\nTOTAL: 11.75".to_string(),
        lines: vec![
            OcrLine { text: "CORNER DELI".to_string(), confidence: Some(0.98) },
            OcrLine { text: "SANDWICH 8.50".to_string(), confidence: Some(0.95) },
            OcrLine { text: "COFFEE 3.25".to_string(), confidence: Some(0.96) },
            OcrLine { text: "TOTAL: 11.75".to_string(), confidence: Some(0.97) },
        ],
        documents: vec![ReceiptDocument {
            merchant: Some("Corner Deli".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2024, 6, 15),
            purchase_time: NaiveTime::from_hms_opt(12, 30, 0),
            items: vec![
                ReceiptItem {
                    description: Some("SANDWICH".to_string()),
                    price: Some(8.50),
                },
                ReceiptItem {
                    description: Some("COFFEE".to_string()),
                    price: Some(3.25),
                },
            ],
            total: Some(11.75),
            subtotal: Some(11.75),
            confidence: 0.95,
        }],
    }
}
