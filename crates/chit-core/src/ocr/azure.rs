//! Azure Document Intelligence backend
//!
//! Drives the `prebuilt-receipt` model over REST: submit the image as a
//! base64 payload, then poll the returned operation until the analysis
//! completes. Provider field objects are mapped into the backend-agnostic
//! types in `ocr::types`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::{OcrAnalysis, OcrLine, ReceiptDocument, ReceiptItem};
use super::OcrBackend;

const API_VERSION: &str = "2024-11-30";
const MODEL_ID: &str = "prebuilt-receipt";

/// How often to poll the analyze operation
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Give up after this many polls (~30s)
const MAX_POLLS: usize = 60;

/// Azure Document Intelligence OCR backend
#[derive(Clone)]
pub struct AzureOcrBackend {
    http_client: Client,
    endpoint: String,
    api_key: String,
}

impl AzureOcrBackend {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment (AZURE_DI_ENDPOINT and AZURE_DI_KEY)
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("AZURE_DI_ENDPOINT").ok()?;
        let api_key = std::env::var("AZURE_DI_KEY").ok()?;
        Some(Self::new(&endpoint, &api_key))
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, MODEL_ID, API_VERSION
        )
    }

    /// Submit the image and return the operation URL to poll
    async fn submit(&self, image: &[u8]) -> Result<String> {
        let body = serde_json::json!({
            "base64Source": base64::engine::general_purpose::STANDARD.encode(image),
        });

        let response = self
            .http_client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Ocr(format!(
                "Analyze submit failed ({}): {}",
                status, text
            )));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| Error::Ocr("Missing Operation-Location header".to_string()))
    }

    /// Poll the operation until it succeeds or fails
    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult> {
        for attempt in 0..MAX_POLLS {
            let response = self
                .http_client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(Error::Ocr(format!("Poll failed ({}): {}", status, text)));
            }

            let operation: AnalyzeOperation = response.json().await?;
            match operation.status.as_str() {
                "succeeded" => {
                    return operation
                        .analyze_result
                        .ok_or_else(|| Error::Ocr("Succeeded without analyzeResult".to_string()));
                }
                "failed" => {
                    return Err(Error::Ocr(format!(
                        "Analysis failed: {}",
                        operation
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "unknown error".to_string())
                    )));
                }
                status => {
                    debug!(attempt, status, "Receipt analysis pending");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }

        Err(Error::Ocr(format!(
            "Analysis did not complete within {} polls",
            MAX_POLLS
        )))
    }
}

#[async_trait]
impl OcrBackend for AzureOcrBackend {
    async fn analyze(&self, image: &[u8]) -> Result<OcrAnalysis> {
        let operation_url = self.submit(image).await?;
        let result = self.poll(&operation_url).await?;
        Ok(map_analyze_result(result))
    }

    async fn health_check(&self) -> bool {
        // The model listing endpoint is a cheap reachability probe
        let url = format!(
            "{}/documentintelligence/documentModels/{}?api-version={}",
            self.endpoint, MODEL_ID, API_VERSION
        );
        match self
            .http_client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("azure:{}", self.endpoint)
    }
}

// ============================================================================
// Wire types (Azure response shapes)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    content: String,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    fields: HashMap<String, Field>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Field {
    value_string: Option<String>,
    value_date: Option<String>,
    value_time: Option<String>,
    value_currency: Option<CurrencyValue>,
    value_number: Option<f64>,
    value_array: Option<Vec<Field>>,
    value_object: Option<HashMap<String, Field>>,
}

#[derive(Debug, Deserialize)]
struct CurrencyValue {
    amount: Option<f64>,
}

impl Field {
    fn amount(&self) -> Option<f64> {
        self.value_currency
            .as_ref()
            .and_then(|c| c.amount)
            .or(self.value_number)
    }
}

fn map_analyze_result(result: AnalyzeResult) -> OcrAnalysis {
    let lines = result
        .pages
        .iter()
        .flat_map(|p| p.words.iter())
        .map(|w| OcrLine {
            text: w.content.clone(),
            confidence: w.confidence,
        })
        .collect();

    let documents = result.documents.iter().map(map_document).collect();

    OcrAnalysis {
        content: result.content,
        lines,
        documents,
    }
}

fn map_document(doc: &Document) -> ReceiptDocument {
    let field = |name: &str| doc.fields.get(name);

    let purchase_date = field("TransactionDate")
        .and_then(|f| f.value_date.as_deref())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

    let purchase_time = field("TransactionTime")
        .and_then(|f| f.value_time.as_deref())
        .and_then(|s| {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        });

    let items = field("Items")
        .and_then(|f| f.value_array.as_ref())
        .map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    let obj = entry.value_object.as_ref();
                    ReceiptItem {
                        description: obj
                            .and_then(|o| o.get("Description"))
                            .and_then(|f| f.value_string.clone()),
                        price: obj.and_then(|o| o.get("TotalPrice")).and_then(|f| f.amount()),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let confidence = doc.confidence.clamp(0.0, 1.0);
    if doc.confidence < 0.0 || doc.confidence > 1.0 {
        warn!(raw = doc.confidence, "Provider confidence outside [0, 1], clamped");
    }

    ReceiptDocument {
        merchant: field("MerchantName").and_then(|f| f.value_string.clone()),
        purchase_date,
        purchase_time,
        items,
        total: field("Total").and_then(|f| f.amount()),
        subtotal: field("Subtotal").and_then(|f| f.amount()),
        confidence,
    }
}
