//! Model output parsing
//!
//! Models wrap their JSON in prose more often than not. The parser cuts
//! out the first balanced-looking object (first `{` to last `}`) and
//! deserializes that, so leading chatter and trailing sign-offs are
//! tolerated.

use serde::Deserialize;

use crate::error::{Error, Result};

/// A category guess as returned by the classification prompt
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CategoryGuess {
    pub category: String,
    pub confidence: f64,
}

/// Parse a category guess out of raw model output
pub fn parse_category_guess(raw: &str) -> Result<CategoryGuess> {
    let json = extract_json_object(raw)
        .ok_or_else(|| Error::InvalidData(format!("No JSON object in reply: {}", truncate(raw))))?;

    serde_json::from_str(json)
        .map_err(|e| Error::InvalidData(format!("Bad category reply ({}): {}", e, truncate(raw))))
}

/// Slice out the first `{` through the last `}`
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn truncate(raw: &str) -> String {
    const MAX: usize = 120;
    if raw.len() <= MAX {
        raw.to_string()
    } else {
        let cut = raw
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &raw[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_json() {
        let guess = parse_category_guess(r#"{"category": "Groceries", "confidence": 0.9}"#).unwrap();
        assert_eq!(guess.category, "Groceries");
        assert!((guess.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_parse_wrapped_in_prose() {
        let raw = r#"Sure! Here is my answer:
{"category": "Transport", "confidence": 0.75}
Let me know if you need anything else."#;
        let guess = parse_category_guess(raw).unwrap();
        assert_eq!(guess.category, "Transport");
    }

    #[test]
    fn test_parse_no_object() {
        assert!(parse_category_guess("I cannot classify that.").is_err());
    }

    #[test]
    fn test_parse_malformed_object() {
        assert!(parse_category_guess(r#"{"category": "Groceries""#).is_err());
        assert!(parse_category_guess(r#"{"confidence": 0.9}"#).is_err());
    }

    #[test]
    fn test_parse_braces_out_of_order() {
        assert!(parse_category_guess("} nothing {").is_err());
    }

    #[test]
    fn test_error_truncates_long_replies() {
        let raw = "x".repeat(500);
        let err = parse_category_guess(&raw).unwrap_err().to_string();
        assert!(err.len() < 250);
        assert!(err.contains("..."));
    }
}
