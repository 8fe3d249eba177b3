//! Translation cache: batched model translation with write-through caching.
//!
//! Callers submit texts through a debounced queue; a worker coalesces
//! submissions into batches (20 texts per model call at most), deduplicates
//! in-flight texts so concurrent identical requests share one upstream call,
//! and writes results into the in-process cache. Full-article translations
//! flow through an ordered cache chain: in-process snapshot, durable
//! per-slug document, then a 7-day local fallback.

use chrono::{DateTime, Utc};
use concierge_common::cache::{Cache, MemoryCache, TieredCache};
use concierge_common::error::CoreError;
use concierge_common::retry::RetryPolicy;
use concierge_common::types::MAX_TRANSLATE_BATCH;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::model::{chat_with_retry, GenerativeBackend, ModelRequest, TurnMessage};
use crate::store::{DocumentStore, DurableCache};

/// Debounce window for coalescing concurrent submissions.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// TTL for the local fallback tier and the in-process snapshot.
const DOCUMENT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Queue capacity; submissions beyond it apply backpressure.
const QUEUE_CAPACITY: usize = 256;

/// Durable snapshot of one translated article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationDocument {
    pub slug: String,
    pub lang: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct Pending {
    text: String,
    lang: String,
    reply: oneshot::Sender<Result<String, CoreError>>,
}

pub struct Translator {
    cache: Arc<MemoryCache>,
    doc_tiers: TieredCache,
    doc_snapshot: Arc<MemoryCache>,
    doc_fallback: Arc<MemoryCache>,
    store: Arc<DocumentStore>,
    queue_tx: mpsc::Sender<Pending>,
}

impl Translator {
    /// Build the translator and spawn its batch worker. Must run inside a
    /// tokio runtime.
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        store: Arc<DocumentStore>,
        policy: RetryPolicy,
    ) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let doc_snapshot = Arc::new(MemoryCache::new());
        let doc_fallback = Arc::new(MemoryCache::new());
        let doc_tiers = TieredCache::new(vec![
            Box::new(doc_snapshot.clone()),
            Box::new(DurableCache::new(store.clone())),
            Box::new(doc_fallback.clone()),
        ]);

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(batch_worker(queue_rx, backend, cache.clone(), policy));

        Self {
            cache,
            doc_tiers,
            doc_snapshot,
            doc_fallback,
            store,
            queue_tx,
        }
    }

    /// Translate `texts` into `lang`. Order-preserving, same length as the
    /// input. Cached texts never reach the model.
    pub async fn translate(
        &self,
        texts: &[String],
        lang: &str,
    ) -> Result<Vec<String>, CoreError> {
        let mut results: Vec<Option<String>> = texts
            .iter()
            .map(|t| self.cache.get(&cache_key(lang, t)))
            .collect();

        if results.iter().all(|r| r.is_some()) {
            return Ok(results.into_iter().map(|r| r.unwrap()).collect());
        }

        // One submission per distinct uncached text; duplicate positions
        // share the answer.
        let mut receivers: HashMap<String, oneshot::Receiver<Result<String, CoreError>>> =
            HashMap::new();
        for (i, text) in texts.iter().enumerate() {
            if results[i].is_some() || receivers.contains_key(text) {
                continue;
            }
            let (tx, rx) = oneshot::channel();
            self.queue_tx
                .send(Pending {
                    text: text.clone(),
                    lang: lang.to_string(),
                    reply: tx,
                })
                .await
                .map_err(|_| CoreError::UpstreamFatal("translation worker gone".into()))?;
            receivers.insert(text.clone(), rx);
        }

        let mut translated: HashMap<String, String> = HashMap::new();
        for (text, rx) in receivers {
            let value = rx
                .await
                .map_err(|_| CoreError::UpstreamFatal("translation worker gone".into()))??;
            translated.insert(text, value);
        }

        for (i, text) in texts.iter().enumerate() {
            if results[i].is_none() {
                results[i] = translated.get(text).cloned();
            }
        }
        Ok(results
            .into_iter()
            .zip(texts)
            .map(|(r, original)| r.unwrap_or_else(|| original.clone()))
            .collect())
    }

    /// Full-article translation through the tiered document cache.
    pub async fn translate_document(
        &self,
        slug: &str,
        lang: &str,
        title: &str,
        body: &str,
    ) -> Result<TranslationDocument, CoreError> {
        let key = document_key(slug, lang);
        if let Some(json) = self.doc_tiers.get(&key) {
            match serde_json::from_str(&json) {
                Ok(doc) => return Ok(doc),
                Err(e) => warn!("Stale translation document for {}: {}", key, e),
            }
        }

        let translated = self
            .translate(&[title.to_string(), body.to_string()], lang)
            .await?;
        let now = Utc::now();
        let doc = TranslationDocument {
            slug: slug.to_string(),
            lang: lang.to_string(),
            title: translated[0].clone(),
            body: translated[1].clone(),
            created_at: now,
            updated_at: now,
        };

        match serde_json::to_string(&doc) {
            Ok(json) => self.doc_tiers.set(&key, &json, Some(DOCUMENT_TTL)),
            Err(e) => warn!("Translation document for {} not cacheable: {}", key, e),
        }
        Ok(doc)
    }

    /// Delete the durable translations of one slug (all languages).
    /// Returns the number of documents removed.
    pub fn delete_document(&self, slug: &str) -> Result<usize, CoreError> {
        let deleted = self
            .store
            .delete_documents_with_prefix(&format!("translation:{}:", slug))
            .map_err(|e| CoreError::Store(e.to_string()))?;
        self.doc_snapshot.clear();
        self.doc_fallback.clear();
        info!("Deleted {} translation documents for {}", deleted, slug);
        Ok(deleted)
    }

    /// Wipe every durable translation document. Returns the count removed.
    pub fn clear_documents(&self) -> Result<usize, CoreError> {
        let deleted = self
            .store
            .delete_documents_with_prefix("translation:")
            .map_err(|e| CoreError::Store(e.to_string()))?;
        self.doc_snapshot.clear();
        self.doc_fallback.clear();
        info!("Cleared {} translation documents", deleted);
        Ok(deleted)
    }
}

fn cache_key(lang: &str, text: &str) -> String {
    format!("{}:{}", lang, text)
}

fn document_key(slug: &str, lang: &str) -> String {
    format!("translation:{}:{}", slug, lang)
}

/// Collect submissions inside the debounce window, then translate them in
/// per-language batches.
async fn batch_worker(
    mut rx: mpsc::Receiver<Pending>,
    backend: Arc<dyn GenerativeBackend>,
    cache: Arc<MemoryCache>,
    policy: RetryPolicy,
) {
    while let Some(first) = rx.recv().await {
        let mut pending = vec![first];

        let debounce = tokio::time::sleep(DEBOUNCE_WINDOW);
        tokio::pin!(debounce);
        loop {
            tokio::select! {
                _ = &mut debounce => break,
                item = rx.recv() => match item {
                    Some(item) => {
                        pending.push(item);
                        if pending.len() >= MAX_TRANSLATE_BATCH {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        let mut by_lang: HashMap<String, Vec<Pending>> = HashMap::new();
        for item in pending {
            by_lang.entry(item.lang.clone()).or_default().push(item);
        }

        for (lang, items) in by_lang {
            run_batch(&*backend, &cache, &policy, &lang, items).await;
        }
    }
}

async fn run_batch(
    backend: &dyn GenerativeBackend,
    cache: &MemoryCache,
    policy: &RetryPolicy,
    lang: &str,
    items: Vec<Pending>,
) {
    let mut distinct: Vec<String> = Vec::new();
    for item in &items {
        if !distinct.contains(&item.text) {
            distinct.push(item.text.clone());
        }
    }

    let mut outcomes: HashMap<String, Result<String, (bool, String)>> = HashMap::new();
    for chunk in distinct.chunks(MAX_TRANSLATE_BATCH) {
        match translate_upstream(backend, policy, chunk, lang).await {
            Ok(translations) => {
                for (text, translated) in chunk.iter().zip(translations) {
                    cache.set(&cache_key(lang, text), &translated, None);
                    outcomes.insert(text.clone(), Ok(translated));
                }
            }
            Err(e) => {
                let failure = (e.is_retryable(), e.to_string());
                for text in chunk {
                    outcomes.insert(text.clone(), Err(failure.clone()));
                }
            }
        }
    }

    for item in items {
        let result = match outcomes.get(&item.text) {
            Some(Ok(translated)) => Ok(translated.clone()),
            Some(Err((true, detail))) => Err(CoreError::UpstreamTransient(detail.clone())),
            Some(Err((false, detail))) => Err(CoreError::UpstreamFatal(detail.clone())),
            None => Err(CoreError::UpstreamFatal("translation missing from batch".into())),
        };
        // A waiter that gave up is fine to ignore.
        let _ = item.reply.send(result);
    }
}

/// One model call for one chunk. Parse failure (or a length mismatch)
/// degrades to the original texts rather than failing the request; only a
/// genuine upstream failure is an error.
async fn translate_upstream(
    backend: &dyn GenerativeBackend,
    policy: &RetryPolicy,
    texts: &[String],
    lang: &str,
) -> Result<Vec<String>, CoreError> {
    let system = format!(
        "Traduce cada elemento del array JSON al idioma '{}'. Conserva los \
         nombres propios y las marcas tal cual. Devuelve UNICAMENTE un array \
         JSON con las traducciones en el mismo orden.",
        lang
    );
    let request = ModelRequest {
        system,
        messages: vec![TurnMessage::user(
            serde_json::to_string(texts).unwrap_or_default(),
        )],
        tools: vec![],
    };

    let reply = chat_with_retry(backend, &request, policy, None).await?;

    match extract_json_array(&reply.text)
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
    {
        Some(translations) if translations.len() == texts.len() => Ok(translations),
        _ => {
            warn!("Translation batch unparsable, returning originals");
            Ok(texts.to_vec())
        }
    }
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedBackend;

    fn translator_with(backend: ScriptedBackend) -> (Translator, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        translator_on(backend, store)
    }

    fn translator_on(
        backend: Arc<ScriptedBackend>,
        store: Arc<DocumentStore>,
    ) -> (Translator, Arc<ScriptedBackend>) {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1));
        let translator = Translator::new(backend.clone(), store, policy);
        (translator, backend)
    }

    fn array_reply(items: &[&str]) -> Result<crate::model::ModelReply, CoreError> {
        ScriptedBackend::text_reply(&serde_json::to_string(items).unwrap())
    }

    #[tokio::test]
    async fn test_translate_batch_order_preserved() {
        let (translator, _) = translator_with(ScriptedBackend::new(vec![array_reply(&[
            "Hello", "Goodbye",
        ])]));

        let out = translator
            .translate(&["Hola".to_string(), "Adios".to_string()], "en")
            .await
            .unwrap();
        assert_eq!(out, vec!["Hello", "Goodbye"]);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let (translator, backend) =
            translator_with(ScriptedBackend::new(vec![array_reply(&["Hello"])]));

        let first = translator.translate(&["Hola".to_string()], "en").await.unwrap();
        let second = translator.translate(&["Hola".to_string()], "en").await.unwrap();
        assert_eq!(first, second);
        // Zero upstream calls on the second invocation.
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_within_request_share_one_call() {
        let (translator, backend) =
            translator_with(ScriptedBackend::new(vec![array_reply(&["Hello"])]));

        let out = translator
            .translate(&["Hola".to_string(), "Hola".to_string()], "en")
            .await
            .unwrap();
        assert_eq!(out, vec!["Hello", "Hello"]);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let (translator, backend) =
            translator_with(ScriptedBackend::new(vec![array_reply(&["Hello"])]));
        let translator = Arc::new(translator);

        let a = {
            let t = translator.clone();
            tokio::spawn(async move { t.translate(&["Hola".to_string()], "en").await })
        };
        let b = {
            let t = translator.clone();
            tokio::spawn(async move { t.translate(&["Hola".to_string()], "en").await })
        };

        assert_eq!(a.await.unwrap().unwrap(), vec!["Hello"]);
        assert_eq!(b.await.unwrap().unwrap(), vec!["Hello"]);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_different_languages_not_mixed() {
        let (translator, backend) = translator_with(ScriptedBackend::new(vec![
            array_reply(&["Hello"]),
            array_reply(&["Bonjour"]),
        ]));

        let en = translator.translate(&["Hola".to_string()], "en").await.unwrap();
        let fr = translator.translate(&["Hola".to_string()], "fr").await.unwrap();
        assert_eq!(en, vec!["Hello"]);
        assert_eq!(fr, vec!["Bonjour"]);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_parse_failure_returns_originals() {
        let (translator, _) = translator_with(ScriptedBackend::new(vec![
            ScriptedBackend::text_reply("I refuse to emit JSON"),
        ]));

        let out = translator.translate(&["Hola".to_string()], "en").await.unwrap();
        assert_eq!(out, vec!["Hola"]);
    }

    #[tokio::test]
    async fn test_length_mismatch_returns_originals() {
        let (translator, _) =
            translator_with(ScriptedBackend::new(vec![array_reply(&["only-one"])]));

        let out = translator
            .translate(&["uno".to_string(), "dos".to_string()], "en")
            .await
            .unwrap();
        assert_eq!(out, vec!["uno", "dos"]);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let (translator, _) = translator_with(ScriptedBackend::new(vec![Err(
            CoreError::UpstreamFatal("no api key".into()),
        )]));

        let result = translator.translate(&["Hola".to_string()], "en").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_document_written_through_to_durable_store() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let backend = Arc::new(ScriptedBackend::new(vec![array_reply(&[
            "Opening hours",
            "Reception is open from 8 to 22.",
        ])]));
        let (translator, backend) = translator_on(backend, store.clone());

        let doc = translator
            .translate_document("horarios", "en", "Horarios", "Recepcion de 8 a 22.")
            .await
            .unwrap();
        assert_eq!(doc.title, "Opening hours");
        assert_eq!(backend.call_count(), 1);

        // A fresh translator over the same store answers from the durable
        // tier without touching the model.
        let backend2 = Arc::new(ScriptedBackend::new(vec![]));
        let (translator2, backend2) = translator_on(backend2, store);
        let again = translator2
            .translate_document("horarios", "en", "Horarios", "Recepcion de 8 a 22.")
            .await
            .unwrap();
        assert_eq!(again.title, "Opening hours");
        assert_eq!(backend2.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_document_reports_count() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let backend = Arc::new(ScriptedBackend::new(vec![
            array_reply(&["T-en", "B-en"]),
            array_reply(&["T-fr", "B-fr"]),
        ]));
        let (translator, _) = translator_on(backend, store);

        translator.translate_document("normas", "en", "T", "B").await.unwrap();
        translator.translate_document("normas", "fr", "T", "B").await.unwrap();

        assert_eq!(translator.delete_document("normas").unwrap(), 2);
        assert_eq!(translator.delete_document("normas").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_documents_reports_count() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let backend = Arc::new(ScriptedBackend::new(vec![
            array_reply(&["A", "B"]),
            array_reply(&["C", "D"]),
        ]));
        let (translator, backend) = translator_on(backend, store);

        translator.translate_document("uno", "en", "t1", "b1").await.unwrap();
        translator.translate_document("dos", "en", "t2", "b2").await.unwrap();
        assert_eq!(backend.call_count(), 2);
        assert_eq!(translator.clear_documents().unwrap(), 2);
        assert_eq!(translator.clear_documents().unwrap(), 0);
    }

    #[test]
    fn test_extract_json_array() {
        assert_eq!(
            extract_json_array("aqui: [\"a\",\"b\"] listo"),
            Some("[\"a\",\"b\"]")
        );
        assert!(extract_json_array("sin array").is_none());
    }
}
