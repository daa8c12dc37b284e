//! Receipt pipeline command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use chit_core::ai::LlmClient;
use chit_core::metrics::PipelineMetrics;
use chit_core::ocr::{OcrBackend, OcrClient};
use chit_core::pipeline::ReceiptPipeline;
use chit_core::session::SessionTracker;
use chit_core::store::ReceiptStore;

use super::open_db;

pub async fn cmd_process(
    db_path: &Path,
    file: &Path,
    user: &str,
    no_encrypt: bool,
) -> Result<()> {
    let image = std::fs::read(file)
        .with_context(|| format!("Failed to read image file {}", file.display()))?;

    let Some(ocr) = OcrClient::from_env() else {
        bail!(
            "No OCR backend configured. Set AZURE_DI_ENDPOINT and AZURE_DI_KEY, \
             or CHIT_OCR_BACKEND=mock for testing."
        );
    };

    let db = open_db(db_path, no_encrypt)?;
    let llm = LlmClient::from_env();
    let receipts_dir = chit_server::receipts_dir_from_env();
    let store = ReceiptStore::new(&receipts_dir)
        .with_context(|| format!("Cannot open receipt store at {}", receipts_dir.display()))?;
    let metrics = Arc::new(PipelineMetrics::new());
    let sessions = Arc::new(SessionTracker::new());

    println!("🧾 Processing {}...", file.display());
    println!("   OCR backend: {}", ocr.describe());

    let pipeline = ReceiptPipeline::new(ocr, llm, db, store, metrics.clone(), sessions);

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("receipt.jpg");
    let (receipts, message) = pipeline.process(&image, filename, user).await;

    if let Some(msg) = message {
        println!();
        println!("   {}", msg);
    }

    if !receipts.is_empty() {
        println!();
        for receipt in &receipts {
            let date = receipt.purchased_at.as_deref().unwrap_or("N/A");
            println!(
                "   #{} {} | {} | {} | ${:.2} (confidence {:.2})",
                receipt.id,
                date,
                receipt.merchant,
                receipt.category,
                receipt.total,
                receipt.confidence
            );
        }

        let snapshot = metrics.snapshot();
        println!();
        println!(
            "✅ Stored {} receipt(s) in {:.1}s",
            receipts.len(),
            snapshot.avg_processing_ms / 1000.0
        );
    }

    Ok(())
}
