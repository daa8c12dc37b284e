//! Backend-agnostic OCR result types
//!
//! Every backend maps its provider response into these shapes; the
//! extraction stage only ever sees this module.

use chrono::{NaiveDate, NaiveTime};

/// One recognized text line with the provider's confidence, if any
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub confidence: Option<f64>,
}

/// One line item detected on a receipt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptItem {
    pub description: Option<String>,
    pub price: Option<f64>,
}

/// One receipt document detected in the image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptDocument {
    pub merchant: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_time: Option<NaiveTime>,
    pub items: Vec<ReceiptItem>,
    pub total: Option<f64>,
    pub subtotal: Option<f64>,
    /// Provider confidence for the whole document, in [0, 1]
    pub confidence: f64,
}

/// Full analysis of one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrAnalysis {
    /// Entire recognized text, used by the keyword total fallback
    pub content: String,
    /// Recognized lines with per-line confidence
    pub lines: Vec<OcrLine>,
    /// Detected receipt documents (may be empty)
    pub documents: Vec<ReceiptDocument>,
}

impl OcrAnalysis {
    /// Mean confidence over lines that carry a score (None if no line does)
    pub fn mean_line_confidence(&self) -> Option<f64> {
        let scores: Vec<f64> = self.lines.iter().filter_map(|l| l.confidence).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
