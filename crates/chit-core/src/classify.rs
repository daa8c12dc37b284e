//! Category classification
//!
//! Asks the model for a category guess, then adjusts confidence from
//! merchant history and runs a bounded refinement loop on low-confidence
//! guesses. This stage never fails the pipeline; anything the model gets
//! wrong degrades to the fallback category.

use tracing::{debug, warn};

use crate::ai::parsing::parse_category_guess;
use crate::ai::LlmBackend;
use crate::categories::{categories_for_prompt, FALLBACK_CATEGORY};
use crate::db::Database;
use crate::metrics::PipelineMetrics;
use crate::models::{Classification, ExtractedReceipt};

/// Guesses below this confidence go through refinement
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Refinement loop cap
pub const MAX_REFINEMENTS: usize = 3;

/// Totals above this get the high-value category prefix
pub const HIGH_VALUE_CUTOFF: f64 = 200.0;

/// Confidence bump for merchants seen often before
pub const HISTORY_BOOST: f64 = 0.1;

/// Visits needed before history counts as signal
pub const FREQUENT_VISITS: i64 = 3;

/// Confidence assigned when the model's reply is unusable
const FALLBACK_CONFIDENCE: f64 = 0.4;

const HIGH_VALUE_PREFIX: &str = "High Value - ";

/// Classify one extracted receipt
pub async fn classify_receipt(
    llm: &impl LlmBackend,
    db: &Database,
    metrics: &PipelineMetrics,
    user_email: &str,
    receipt: &ExtractedReceipt,
) -> Classification {
    let mut guess = initial_guess(llm, receipt).await;
    guess.confidence = guess.confidence.clamp(0.0, 1.0);

    if let Some(merchant) = &receipt.merchant {
        match db.merchant_history(user_email, merchant) {
            Ok(Some(history)) if history.frequency >= FREQUENT_VISITS => {
                debug!(
                    merchant = %merchant,
                    visits = history.frequency,
                    "Boosting confidence from merchant history"
                );
                guess.confidence = (guess.confidence + HISTORY_BOOST).clamp(0.0, 1.0);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Merchant history lookup failed, skipping boost"),
        }
    }

    let mut refinements = 0;
    while guess.confidence < CONFIDENCE_THRESHOLD && refinements < MAX_REFINEMENTS {
        if receipt.total > HIGH_VALUE_CUTOFF {
            // Relabels on every pass, so a guess that stays under the
            // threshold accumulates the prefix once per iteration.
            guess.category = format!("{}{}", HIGH_VALUE_PREFIX, guess.category);
            guess.confidence = (guess.confidence + 0.1).clamp(0.0, 1.0);
        } else {
            guess.confidence = CONFIDENCE_THRESHOLD;
        }
        refinements += 1;
    }

    metrics.record_classification_confidence(guess.confidence);

    Classification {
        category: guess.category,
        confidence: guess.confidence,
    }
}

async fn initial_guess(llm: &impl LlmBackend, receipt: &ExtractedReceipt) -> Classification {
    let prompt = classification_prompt(receipt);

    let raw = match llm.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Classification completion failed, using fallback");
            return fallback();
        }
    };

    match parse_category_guess(&raw) {
        Ok(guess) => Classification {
            category: guess.category,
            confidence: guess.confidence,
        },
        Err(e) => {
            warn!(error = %e, "Unparseable classification reply, using fallback");
            fallback()
        }
    }
}

fn fallback() -> Classification {
    Classification {
        category: FALLBACK_CATEGORY.to_string(),
        confidence: FALLBACK_CONFIDENCE,
    }
}

fn classification_prompt(receipt: &ExtractedReceipt) -> String {
    format!(
        "Classify this purchase into exactly one category from this list: {}.\n\
         Merchant: {}\n\
         Total: {:.2}\n\
         Items: {}\n\
         Reply with only a JSON object of the form \
         {{\"category\": \"...\", \"confidence\": 0.0}} where confidence is \
         your certainty between 0 and 1.",
        categories_for_prompt(),
        receipt.display_merchant(),
        receipt.total,
        receipt.item_count,
    )
}
