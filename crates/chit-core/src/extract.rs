//! Receipt field extraction
//!
//! Turns an OCR analysis into structured receipts. Low-confidence scans
//! get exactly one re-run, and the total falls back through an ordered
//! strategy chain when the provider did not read one directly.

use std::sync::OnceLock;

use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::models::ExtractedReceipt;
use crate::ocr::{OcrAnalysis, OcrBackend, ReceiptDocument};

/// Mean line confidence below which the scan is re-run once
pub const OCR_RETRY_THRESHOLD: f64 = 0.70;

/// One way of resolving a receipt total from the analysis
type TotalStrategy = fn(&ReceiptDocument, &str) -> Option<f64>;

/// Ordered total resolution chain; the first hit wins
const TOTAL_STRATEGIES: [TotalStrategy; 4] =
    [provider_total, provider_subtotal, keyword_total, item_sum];

/// Run OCR over the image and extract structured receipts
///
/// If the mean line confidence comes back below the retry threshold,
/// the analysis is re-run exactly once and the second result is used
/// regardless of its confidence.
pub async fn extract_receipts(
    ocr: &impl OcrBackend,
    metrics: &PipelineMetrics,
    image: &[u8],
) -> Result<Vec<ExtractedReceipt>> {
    let mut analysis = ocr.analyze(image).await?;

    if let Some(confidence) = analysis.mean_line_confidence() {
        if confidence < OCR_RETRY_THRESHOLD {
            info!(
                confidence = format!("{:.2}", confidence),
                "Low OCR confidence, retrying scan"
            );
            metrics.record_retry();
            analysis = ocr.analyze(image).await?;
        }
    }

    Ok(receipts_from_analysis(&analysis))
}

/// Map each detected document into an extracted receipt
pub fn receipts_from_analysis(analysis: &OcrAnalysis) -> Vec<ExtractedReceipt> {
    analysis
        .documents
        .iter()
        .map(|doc| {
            let total = resolve_total(doc, &analysis.content);
            debug!(
                merchant = doc.merchant.as_deref().unwrap_or("unknown"),
                total, "Extracted receipt"
            );
            ExtractedReceipt {
                merchant: doc.merchant.clone(),
                purchased_at: combine_date_time(doc),
                item_count: doc.items.len() as i64,
                total,
                ocr_confidence: doc.confidence.clamp(0.0, 1.0),
            }
        })
        .collect()
}

/// Resolve the total through the strategy chain, defaulting to 0.0
fn resolve_total(doc: &ReceiptDocument, content: &str) -> f64 {
    TOTAL_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(doc, content))
        .unwrap_or(0.0)
}

fn provider_total(doc: &ReceiptDocument, _content: &str) -> Option<f64> {
    doc.total
}

fn provider_subtotal(doc: &ReceiptDocument, _content: &str) -> Option<f64> {
    doc.subtotal
}

/// Scan the raw text for a labelled amount (TOTAL: 45.99 and the like)
fn keyword_total(_doc: &ReceiptDocument, content: &str) -> Option<f64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:TOTAL|AMOUNT|BALANCE)\s*:?\s*\$?(\d+(?:[.,]\d{2})?)")
            .unwrap_or_else(|e| panic!("invalid total pattern: {e}"))
    });

    let capture = re.captures(content)?;
    capture.get(1)?.as_str().replace(',', ".").parse().ok()
}

/// Sum the priced line items; only counts if at least one item has a price
fn item_sum(doc: &ReceiptDocument, _content: &str) -> Option<f64> {
    let prices: Vec<f64> = doc.items.iter().filter_map(|i| i.price).collect();
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum())
}

/// Combine the provider's date and time into one timestamp
///
/// A date without a time means midnight; no date means no timestamp,
/// even if a time was read.
fn combine_date_time(doc: &ReceiptDocument) -> Option<NaiveDateTime> {
    let date = doc.purchase_date?;
    let time = doc
        .purchase_time
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default());
    Some(NaiveDateTime::new(date, time))
}
