//! Answer orchestration: compose, dispatch, tool loop, parse.
//!
//! Drives one logical chat request against the generative backend. Upstream
//! failures are retried with backoff; whatever goes wrong afterwards
//! collapses into a localized, user-safe answer - this function never
//! surfaces a raw error to the route.

use concierge_common::answer::parse_model_answer;
use concierge_common::knowledge::{KnowledgeBase, SITE_SUMMARY_ID};
use concierge_common::messages;
use concierge_common::reconcile::reconcile;
use concierge_common::retrieval::retrieve;
use concierge_common::retry::RetryPolicy;
use concierge_common::types::{clamp_history, ChatMessage, ChatResponse, EvidenceRecord};
use concierge_common::CoreError;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::content::{merge_dedup, ContentClient};
use crate::model::{chat_with_retry, GenerativeBackend, ModelRequest, ToolSpec, TurnMessage};

/// Hard cap on tool-execution rounds per request.
const MAX_TOOL_ROUNDS: usize = 3;

/// Knowledge-base records retrieved per query.
const RETRIEVAL_K: usize = 5;

/// Content-store records fetched per lookup.
const CONTENT_LIMIT: usize = 4;

/// Inputs for one chat request.
#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub lang: String,
    pub current_date: Option<String>,
    pub current_time: Option<String>,
}

pub struct Orchestrator {
    backend: Arc<dyn GenerativeBackend>,
    content: Arc<ContentClient>,
    kb: Arc<KnowledgeBase>,
    policy: RetryPolicy,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        content: Arc<ContentClient>,
        kb: Arc<KnowledgeBase>,
        policy: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            backend,
            content,
            kb,
            policy,
            deadline,
        }
    }

    /// Answer one question. Never fails: every failure mode maps to a
    /// localized fallback answer.
    pub async fn answer(&self, input: &AnswerInput) -> ChatResponse {
        let deadline = Instant::now() + self.deadline;
        let history = clamp_history(&input.history);

        let mut evidence = self.gather_evidence(&input.message).await;

        let system = crate::prompts::build_system_instruction(
            &input.lang,
            history.is_empty(),
            input.current_date.as_deref(),
            input.current_time.as_deref(),
        );
        let user = crate::prompts::build_user_message(&input.message, &history, &evidence);

        let mut messages = vec![TurnMessage::user(user)];
        let mut rounds = 0usize;

        let final_text = loop {
            let request = ModelRequest {
                system: system.clone(),
                messages: messages.clone(),
                tools: tool_specs(),
            };

            let reply = match chat_with_retry(
                self.backend.as_ref(),
                &request,
                &self.policy,
                Some(deadline),
            )
            .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Model call failed after retries: {}", e);
                    return ChatResponse::without_sources(messages::service_trouble(&input.lang));
                }
            };

            if reply.tool_calls.is_empty() || rounds >= MAX_TOOL_ROUNDS {
                if !reply.tool_calls.is_empty() {
                    warn!("Tool round cap reached, parsing partial text");
                }
                break reply.text;
            }
            if Instant::now() >= deadline {
                warn!("Request deadline hit inside tool loop");
                break reply.text;
            }

            rounds += 1;
            info!("Tool round {}: {} calls", rounds, reply.tool_calls.len());

            messages.push(TurnMessage::assistant(
                json!({ "toolCalls": reply.tool_calls }).to_string(),
            ));

            // Results are keyed by the original call identifier; records the
            // tools surface join the evidence set so citations to them pass
            // reconciliation.
            let mut results = Map::new();
            for call in &reply.tool_calls {
                let (value, records) = self.dispatch_tool(&call.name, &call.args).await;
                merge_dedup(&mut evidence, records);
                results.insert(call.id.clone(), value);
            }
            messages.push(TurnMessage::tool(
                json!({ "results": Value::Object(results) }).to_string(),
            ));
        };

        match parse_model_answer(&final_text) {
            Some(parsed) if parsed.is_substantive() => ChatResponse {
                answer: parsed.answer,
                sources: reconcile(&parsed.sources, &evidence),
            },
            _ => ChatResponse::without_sources(messages::no_information(&input.lang)),
        }
    }

    /// Merge knowledge-base retrieval with content-store lookups; fall back
    /// to the core subset so the model always has minimal grounding.
    async fn gather_evidence(&self, query: &str) -> Vec<EvidenceRecord> {
        let mut evidence = retrieve(self.kb.records(), query, RETRIEVAL_K);
        merge_dedup(&mut evidence, self.content.lookup(query, CONTENT_LIMIT).await);

        if evidence.is_empty() {
            return self.kb.core_evidence();
        }

        if let Some(pos) = evidence.iter().position(|r| r.id == SITE_SUMMARY_ID) {
            if pos > 0 {
                let summary = evidence.remove(pos);
                evidence.insert(0, summary);
            }
        }
        evidence
    }

    /// Closed tool registry. Unknown names produce an explicit error result
    /// for that call id instead of a silent no-op.
    async fn dispatch_tool(&self, name: &str, args: &Value) -> (Value, Vec<EvidenceRecord>) {
        match name {
            "search_articles" => {
                let query = args["query"].as_str().unwrap_or_default();
                let records = self.content.lookup(query, CONTENT_LIMIT).await;
                (records_value(&records), records)
            }
            "articles_by_date" => {
                let date = args["date"].as_str().unwrap_or_default();
                let records = self.content.articles_by_date(date, CONTENT_LIMIT).await;
                (records_value(&records), records)
            }
            other => {
                warn!("Model requested unknown tool: {}", other);
                (json!({ "error": format!("unknown tool: {}", other) }), vec![])
            }
        }
    }
}

fn records_value(records: &[EvidenceRecord]) -> Value {
    serde_json::to_value(records).unwrap_or_else(|_| json!([]))
}

fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "search_articles".to_string(),
            description: "Busca articulos de la web por palabras clave".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: "articles_by_date".to_string(),
            description: "Recupera articulos publicados en una fecha (YYYY-MM-DD)".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "date": { "type": "string" } },
                "required": ["date"]
            }),
        },
    ]
}
