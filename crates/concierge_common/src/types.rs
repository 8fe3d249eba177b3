//! Wire and data model types shared between the daemon and its tests.

use serde::{Deserialize, Serialize};

/// Hard cap on a single chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 800;

/// Number of trailing history entries forwarded to the model.
pub const MAX_HISTORY_MESSAGES: usize = 10;

/// Maximum texts accepted per translation request.
pub const MAX_TRANSLATE_BATCH: usize = 20;

/// A short titled document used to ground model answers.
///
/// Records are immutable once constructed. Knowledge-base records are built
/// at startup; content-store records are built per request and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EvidenceRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            section: None,
            content: content.into(),
            tags,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One caller-supplied conversation turn. The protocol is stateless: the
/// full history arrives with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Truncate history to the most recent entries and cap each entry's content.
pub fn clamp_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    history[start..]
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: truncate_chars(&m.content, MAX_MESSAGE_CHARS),
        })
        .collect()
}

/// Character-boundary-safe truncation.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// A citation returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Source {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            excerpt: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub current_date: Option<String>,
    #[serde(default)]
    pub current_time: Option<String>,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

fn default_lang() -> String {
    "es".to_string()
}

/// Body of a `POST /chat` response. Errors use the same shape with a
/// localized message so the chat UI never renders a raw failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl ChatResponse {
    pub fn without_sources(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: vec![],
        }
    }
}

/// Body of `POST /translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub texts: Vec<String>,
    pub target_lang: String,
}

/// Body of a `POST /translate` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_history_drops_oldest() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage::user(format!("message {}", i)))
            .collect();

        let clamped = clamp_history(&history);
        assert_eq!(clamped.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(clamped[0].content, "message 5");
        assert_eq!(clamped.last().unwrap().content, "message 14");
    }

    #[test]
    fn test_clamp_history_caps_content() {
        let long = "x".repeat(2000);
        let clamped = clamp_history(&[ChatMessage::assistant(long)]);
        assert_eq!(clamped[0].content.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_truncate_chars_multibyte_safe() {
        let s = "ñáé".repeat(400);
        let out = truncate_chars(&s, 10);
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn test_chat_request_field_names() {
        let body = r#"{"message":"hola","lang":"es","captchaToken":"tok","currentDate":"2025-06-01"}"#;
        let req: ChatRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.captcha_token.as_deref(), Some("tok"));
        assert_eq!(req.current_date.as_deref(), Some("2025-06-01"));
        assert!(req.history.is_empty());
    }

    #[test]
    fn test_source_excerpt_omitted_when_none() {
        let json = serde_json::to_string(&Source::new("Contacto", "/contacto")).unwrap();
        assert!(!json.contains("excerpt"));
    }
}
