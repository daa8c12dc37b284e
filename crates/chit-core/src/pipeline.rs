//! Receipt processing pipeline
//!
//! Ties the stages together: store the image, run OCR extraction,
//! classify each receipt, persist the rows. Stage progress is reported
//! through the session tracker and every run lands in the metrics
//! registry, errors included. The pipeline never panics a request; any
//! stage failure becomes a user-facing message.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::classify::classify_receipt;
use crate::db::Database;
use crate::error::Result;
use crate::extract::extract_receipts;
use crate::metrics::PipelineMetrics;
use crate::models::{NewReceipt, ProcessedReceipt, ReceiptSummary};
use crate::ocr::OcrClient;
use crate::session::{PipelineStage, SessionTracker};
use crate::store::ReceiptStore;
use crate::ai::LlmClient;

/// Below this OCR confidence a receipt is stored but flagged in the logs
const LOW_OCR_ADVISORY: f64 = 0.5;

const EMPTY_SCAN_MESSAGE: &str = "No receipt content detected. Please try another image.";

/// The full upload-to-storage pipeline
#[derive(Clone)]
pub struct ReceiptPipeline {
    ocr: OcrClient,
    llm: LlmClient,
    db: Database,
    store: ReceiptStore,
    metrics: Arc<PipelineMetrics>,
    sessions: Arc<SessionTracker>,
}

impl ReceiptPipeline {
    pub fn new(
        ocr: OcrClient,
        llm: LlmClient,
        db: Database,
        store: ReceiptStore,
        metrics: Arc<PipelineMetrics>,
        sessions: Arc<SessionTracker>,
    ) -> Self {
        Self {
            ocr,
            llm,
            db,
            store,
            metrics,
            sessions,
        }
    }

    /// Process one uploaded image for a user
    ///
    /// Returns the stored receipts plus an optional user-facing message.
    /// Errors never escape; they come back as a message with an empty
    /// receipt list.
    pub async fn process(
        &self,
        image: &[u8],
        filename: &str,
        user_email: &str,
    ) -> (Vec<ProcessedReceipt>, Option<String>) {
        let start = Instant::now();

        let outcome = match self.run(image, filename, user_email).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Receipt processing failed");
                (Vec::new(), Some(format!("Error processing receipt: {}", e)))
            }
        };

        self.metrics.record_processing_time(start.elapsed());
        self.sessions.clear_stage(user_email).await;
        debug!(metrics = ?self.metrics.snapshot(), "Pipeline run finished");

        outcome
    }

    async fn run(
        &self,
        image: &[u8],
        filename: &str,
        user_email: &str,
    ) -> Result<(Vec<ProcessedReceipt>, Option<String>)> {
        self.sessions
            .set_stage(user_email, PipelineStage::Uploading)
            .await;
        let stored = self.store.save(image, filename)?;

        self.sessions.set_stage(user_email, PipelineStage::Ocr).await;
        let extracted = extract_receipts(&self.ocr, &self.metrics, image).await?;

        if extracted.is_empty() {
            info!("Scan produced no receipt documents");
            return Ok((Vec::new(), Some(EMPTY_SCAN_MESSAGE.to_string())));
        }

        self.sessions
            .set_stage(user_email, PipelineStage::Categorization)
            .await;

        let mut processed = Vec::with_capacity(extracted.len());
        for receipt in &extracted {
            self.metrics.record_ocr_confidence(receipt.ocr_confidence);
            if receipt.ocr_confidence < LOW_OCR_ADVISORY {
                warn!(
                    merchant = receipt.display_merchant(),
                    confidence = format!("{:.2}", receipt.ocr_confidence),
                    "Low-confidence receipt stored as-is"
                );
            }

            let classification =
                classify_receipt(&self.llm, &self.db, &self.metrics, user_email, receipt).await;

            let id = self.db.insert_receipt(&NewReceipt {
                merchant: receipt.merchant.clone(),
                purchased_at: receipt.purchased_at,
                item_count: receipt.item_count,
                category: classification.category.clone(),
                total: Some(receipt.total),
                image_url: Some(stored.url.clone()),
                user_email: user_email.to_string(),
                ocr_confidence: Some(receipt.ocr_confidence),
                classification_confidence: Some(classification.confidence),
            })?;
            self.metrics.record_receipt();

            let purchased_at = receipt.purchased_at.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
            self.sessions
                .remember_receipt(
                    user_email,
                    ReceiptSummary {
                        merchant: receipt.display_merchant().to_string(),
                        category: classification.category.clone(),
                        total: receipt.total,
                        purchased_at: purchased_at.clone(),
                    },
                )
                .await;

            info!(
                id,
                merchant = receipt.display_merchant(),
                category = %classification.category,
                total = receipt.total,
                "Stored receipt"
            );

            processed.push(ProcessedReceipt {
                id,
                merchant: receipt.display_merchant().to_string(),
                purchased_at,
                item_count: receipt.item_count,
                category: classification.category,
                total: receipt.total,
                confidence: classification.confidence,
                image_url: Some(stored.url.clone()),
            });
        }

        Ok((processed, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{MockOcrBackend, OcrAnalysis, ReceiptDocument};

    const USER: &str = "test@example.com";

    fn pipeline_with(ocr: OcrClient) -> (ReceiptPipeline, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = ReceiptPipeline::new(
            ocr,
            LlmClient::mock(),
            Database::in_memory().expect("in-memory db"),
            ReceiptStore::new(tmp.path()).expect("store"),
            Arc::new(PipelineMetrics::new()),
            Arc::new(SessionTracker::new()),
        );
        (pipeline, tmp)
    }

    #[tokio::test]
    async fn test_happy_path_stores_and_reports() {
        let (pipeline, _tmp) = pipeline_with(OcrClient::mock());

        let (receipts, message) = pipeline.process(b"image", "deli.jpg", USER).await;

        assert!(message.is_none());
        assert_eq!(receipts.len(), 1);
        let receipt = &receipts[0];
        assert_eq!(receipt.merchant, "Corner Deli");
        assert_eq!(receipt.category, "Food & Beverage");
        assert!((receipt.total - 11.75).abs() < 1e-9);
        assert!(receipt.image_url.as_deref().unwrap().starts_with("/receipts/"));

        // Row landed in the database
        let stored = pipeline.db.get_receipt(USER, receipt.id).unwrap();
        assert_eq!(stored.category, "Food & Beverage");
        assert_eq!(stored.total, Some(11.75));
        assert!(stored.classification_confidence.is_some());
    }

    #[tokio::test]
    async fn test_session_reflects_run() {
        let (pipeline, _tmp) = pipeline_with(OcrClient::mock());

        pipeline.process(b"image", "deli.jpg", USER).await;

        let snap = pipeline.sessions.snapshot(USER).await.unwrap();
        assert_eq!(snap.pending_stage, None);
        assert_eq!(snap.receipt_count, 1);
        assert_eq!(snap.last_receipt.unwrap().merchant, "Corner Deli");
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (pipeline, _tmp) = pipeline_with(OcrClient::mock());

        pipeline.process(b"image", "deli.jpg", USER).await;

        let snapshot = pipeline.metrics.snapshot();
        assert_eq!(snapshot.receipts_processed, 1);
        assert_eq!(snapshot.runs, 1);
        assert!(snapshot.avg_ocr_confidence > 0.9);
        assert!(snapshot.avg_classification_confidence > 0.0);
    }

    #[tokio::test]
    async fn test_ocr_confidence_sampled_per_receipt() {
        let analysis = OcrAnalysis {
            documents: vec![
                ReceiptDocument {
                    confidence: 0.9,
                    ..Default::default()
                },
                ReceiptDocument {
                    confidence: 0.1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let backend = MockOcrBackend::with_analysis(analysis);
        let (pipeline, _tmp) = pipeline_with(OcrClient::Mock(backend));

        let (receipts, _) = pipeline.process(b"image", "two.jpg", USER).await;

        assert_eq!(receipts.len(), 2);
        let snapshot = pipeline.metrics.snapshot();
        assert_eq!(snapshot.receipts_processed, 2);
        // One confidence sample per receipt, averaged across documents
        assert!((snapshot.avg_ocr_confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_scan_message() {
        let empty = MockOcrBackend::with_analysis(OcrAnalysis::default());
        let (pipeline, _tmp) = pipeline_with(OcrClient::Mock(empty));

        let (receipts, message) = pipeline.process(b"image", "blank.jpg", USER).await;

        assert!(receipts.is_empty());
        assert_eq!(message.as_deref(), Some(EMPTY_SCAN_MESSAGE));
        assert_eq!(pipeline.db.count_receipts(USER).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ocr_failure_becomes_message() {
        let (pipeline, _tmp) = pipeline_with(OcrClient::Mock(MockOcrBackend::unhealthy()));

        let (receipts, message) = pipeline.process(b"image", "x.jpg", USER).await;

        assert!(receipts.is_empty());
        assert!(message.unwrap().starts_with("Error processing receipt:"));
        // The run is still counted and the stage cleared
        assert_eq!(pipeline.metrics.snapshot().runs, 1);
        let snap = pipeline.sessions.snapshot(USER).await.unwrap();
        assert_eq!(snap.pending_stage, None);
    }

    #[tokio::test]
    async fn test_empty_upload_becomes_message() {
        let (pipeline, _tmp) = pipeline_with(OcrClient::mock());
        let (receipts, message) = pipeline.process(b"", "x.jpg", USER).await;
        assert!(receipts.is_empty());
        assert!(message.unwrap().contains("Empty image upload"));
    }
}
