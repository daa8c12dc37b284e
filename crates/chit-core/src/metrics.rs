//! In-process pipeline metrics
//!
//! A constructed collector rather than global state: the owner (server
//! state, CLI command) creates one and threads a reference through the
//! pipeline. Interior synchronization keeps recording cheap from async
//! handlers.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
struct MetricsInner {
    receipts_processed: u64,
    ocr_confidence_sum: f64,
    ocr_confidence_count: u64,
    classification_confidence_sum: f64,
    classification_confidence_count: u64,
    ocr_retries: u64,
    processing_ms_sum: u64,
    runs: u64,
}

/// Aggregated pipeline counters with averaged snapshots
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    inner: Mutex<MetricsInner>,
}

/// Point-in-time view of the collector
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub receipts_processed: u64,
    pub avg_ocr_confidence: f64,
    pub avg_classification_confidence: f64,
    pub ocr_retries: u64,
    pub avg_processing_ms: f64,
    pub runs: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one receipt making it through the pipeline
    pub fn record_receipt(&self) {
        let mut inner = self.lock();
        inner.receipts_processed += 1;
    }

    /// Record the OCR confidence of one extracted receipt
    pub fn record_ocr_confidence(&self, confidence: f64) {
        let mut inner = self.lock();
        inner.ocr_confidence_sum += confidence;
        inner.ocr_confidence_count += 1;
    }

    /// Record the final classification confidence of one receipt
    pub fn record_classification_confidence(&self, confidence: f64) {
        let mut inner = self.lock();
        inner.classification_confidence_sum += confidence;
        inner.classification_confidence_count += 1;
    }

    /// Record an OCR retry (triggered by low mean line confidence)
    pub fn record_retry(&self) {
        let mut inner = self.lock();
        inner.ocr_retries += 1;
    }

    /// Record the wall-clock duration of one pipeline run
    pub fn record_processing_time(&self, elapsed: Duration) {
        let mut inner = self.lock();
        inner.processing_ms_sum += elapsed.as_millis() as u64;
        inner.runs += 1;
    }

    /// Current averaged view of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        let avg = |sum: f64, count: u64| if count > 0 { sum / count as f64 } else { 0.0 };
        MetricsSnapshot {
            receipts_processed: inner.receipts_processed,
            avg_ocr_confidence: avg(inner.ocr_confidence_sum, inner.ocr_confidence_count),
            avg_classification_confidence: avg(
                inner.classification_confidence_sum,
                inner.classification_confidence_count,
            ),
            ocr_retries: inner.ocr_retries,
            avg_processing_ms: avg(inner.processing_ms_sum as f64, inner.runs),
            runs: inner.runs,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        // A poisoned lock only means another thread panicked mid-increment;
        // the counters are still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
