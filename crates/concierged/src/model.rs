//! Generative model client.
//!
//! Provides a generic backend trait so orchestration and translation can be
//! exercised against a scripted backend in tests, plus the HTTP
//! implementation used in production.

use async_trait::async_trait;
use concierge_common::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;

/// One turn sent to the model. `role` is user, assistant, or tool.
#[derive(Debug, Clone, Serialize)]
pub struct TurnMessage {
    pub role: String,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
        }
    }
}

/// Declaration of a callable tool function.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A full model request: system instruction, conversation, declared tools.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<TurnMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The model's reply: free text, tool calls, or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "toolCalls")]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Generic generative backend.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, CoreError>;
}

/// HTTP backend for a remote model endpoint.
pub struct HttpBackend {
    config: ModelConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: ModelConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::UpstreamFatal(format!("http client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GenerativeBackend for HttpBackend {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, CoreError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "system": request.system,
            "messages": request.messages,
            "tools": request.tools,
        });

        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            // Connection failures and timeouts are worth a retry.
            CoreError::UpstreamTransient(format!("model request: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = format!("model returned {}", status);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(CoreError::UpstreamTransient(detail))
            } else {
                Err(CoreError::UpstreamFatal(detail))
            };
        }

        let reply: ModelReply = response
            .json()
            .await
            .map_err(|e| CoreError::Parse(format!("model reply: {}", e)))?;

        debug!(
            "Model reply: {} chars, {} tool calls",
            reply.text.len(),
            reply.tool_calls.len()
        );
        Ok(reply)
    }
}

/// Call the backend, retrying transient failures under `policy`.
///
/// The same policy object serves every upstream call site. An optional
/// deadline stops retrying once the request has run out of time.
pub async fn chat_with_retry(
    backend: &dyn GenerativeBackend,
    request: &ModelRequest,
    policy: &concierge_common::retry::RetryPolicy,
    deadline: Option<std::time::Instant>,
) -> Result<ModelReply, CoreError> {
    let mut attempt = 0u32;
    loop {
        match backend.chat(request).await {
            Ok(reply) => return Ok(reply),
            Err(e)
                if e.is_retryable()
                    && policy.should_retry(attempt)
                    && deadline.map_or(true, |d| std::time::Instant::now() < d) =>
            {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Transient model failure (attempt {}): {} - retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Scripted backend for tests: pops one canned result per call and records
/// every request it saw.
pub struct ScriptedBackend {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<ModelReply, CoreError>>>,
    pub calls: std::sync::Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ModelReply, CoreError>>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn text_reply(text: &str) -> Result<ModelReply, CoreError> {
        Ok(ModelReply {
            text: text.to_string(),
            tool_calls: vec![],
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn chat(&self, request: &ModelRequest) -> Result<ModelReply, CoreError> {
        self.calls.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::UpstreamFatal("script exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_deserializes_tool_calls() {
        let json = r#"{"text":"","toolCalls":[{"id":"c1","name":"search_articles","args":{"query":"piscina"}}]}"#;
        let reply: ModelReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "search_articles");
        assert_eq!(reply.tool_calls[0].args["query"], "piscina");
    }

    #[test]
    fn test_reply_defaults() {
        let reply: ModelReply = serde_json::from_str(r#"{"text":"hola"}"#).unwrap();
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_backend_pops_in_order() {
        let backend = ScriptedBackend::new(vec![
            ScriptedBackend::text_reply("uno"),
            ScriptedBackend::text_reply("dos"),
        ]);
        let request = ModelRequest {
            system: String::new(),
            messages: vec![],
            tools: vec![],
        };
        assert_eq!(backend.chat(&request).await.unwrap().text, "uno");
        assert_eq!(backend.chat(&request).await.unwrap().text, "dos");
        assert!(backend.chat(&request).await.is_err());
        assert_eq!(backend.call_count(), 3);
    }
}
