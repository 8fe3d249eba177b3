//! Parsing of the model's structured final answer.
//!
//! The model is instructed to finish with a single JSON object
//! `{"answer": ..., "sources": [...]}`. Models wrap that object in prose or
//! code fences often enough that we scan for the first balanced object
//! instead of parsing the whole text.

use crate::types::Source;
use serde::Deserialize;

/// Sentinel the model answers with when the evidence does not cover the
/// question. Collapsed to the localized "no information" response.
pub const NOT_FOUND_SENTINEL: &str = "NO_INFORMATION";

/// The model's structured output.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ModelAnswer {
    /// A substantive answer is anything other than the sentinel.
    pub fn is_substantive(&self) -> bool {
        self.answer.trim() != NOT_FOUND_SENTINEL && !self.answer.trim().is_empty()
    }
}

/// Extract the first balanced `{...}` object, honoring string literals and
/// escapes so braces inside answer text do not derail the scan.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the model's final text into a structured answer.
///
/// Returns `None` for missing, unbalanced, or schema-mismatched output; the
/// caller downgrades that to the canonical "no information" response.
pub fn parse_model_answer(text: &str) -> Option<ModelAnswer> {
    let object = extract_first_json_object(text)?;
    serde_json::from_str(object).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let parsed = parse_model_answer(r#"{"answer":"X","sources":[{"title":"Contacto","url":"/contacto"}]}"#).unwrap();
        assert_eq!(parsed.answer, "X");
        assert_eq!(parsed.sources.len(), 1);
    }

    #[test]
    fn test_parse_object_wrapped_in_prose() {
        let text = "Claro, aqui tienes:\n```json\n{\"answer\":\"Si\",\"sources\":[]}\n```\nEspero que ayude.";
        let parsed = parse_model_answer(text).unwrap();
        assert_eq!(parsed.answer, "Si");
    }

    #[test]
    fn test_braces_inside_strings_do_not_break_balance() {
        let text = r#"{"answer":"usa {placeholders} con cuidado","sources":[]}"#;
        let parsed = parse_model_answer(text).unwrap();
        assert!(parsed.answer.contains("{placeholders}"));
    }

    #[test]
    fn test_missing_sources_defaults_empty() {
        let parsed = parse_model_answer(r#"{"answer":"hola"}"#).unwrap();
        assert!(parsed.sources.is_empty());
    }

    #[test]
    fn test_unparsable_returns_none() {
        assert!(parse_model_answer("no json here").is_none());
        assert!(parse_model_answer("{\"answer\": unterminated").is_none());
    }

    #[test]
    fn test_sentinel_not_substantive() {
        let parsed = parse_model_answer(&format!("{{\"answer\":\"{}\"}}", NOT_FOUND_SENTINEL)).unwrap();
        assert!(!parsed.is_substantive());
    }
}
