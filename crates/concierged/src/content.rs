//! Content store lookup adapter.
//!
//! Wraps the external content store's keyword search and normalizes results
//! into the same record shape as the knowledge base. Tolerant of upstream
//! failure: a broken or absent store degrades to an empty result, never to
//! an error for the caller.

use concierge_common::types::EvidenceRecord;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::ContentConfig;

/// Raw article record as the content store returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreArticle {
    title: String,
    slug: String,
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<StoreArticle>,
}

impl StoreArticle {
    fn into_record(self) -> EvidenceRecord {
        let url = match &self.subcategory {
            Some(sub) => format!("/{}/{}/{}", self.category, sub, self.slug),
            None => format!("/{}/{}", self.category, self.slug),
        };
        let mut record = EvidenceRecord::new(
            format!("article-{}", self.slug),
            self.title,
            url,
            self.body,
            vec![self.category.clone()],
        )
        .with_section(self.category);
        if let Some(published) = self.published_at {
            record.content = format!("({}) {}", published, record.content);
        }
        record
    }
}

/// Client for the content store's search API.
pub struct ContentClient {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl ContentClient {
    pub fn new(config: &ContentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: config.endpoint.clone(),
            client,
        }
    }

    /// Keyword search. Returns an empty list when the store is not
    /// configured or the call fails.
    pub async fn lookup(&self, query: &str, limit: usize) -> Vec<EvidenceRecord> {
        let Some(endpoint) = &self.endpoint else {
            return vec![];
        };

        let url = format!("{}/articles", endpoint);
        let result = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", &limit.to_string())])
            .send()
            .await;

        self.collect(result, "search").await
    }

    /// Date-indexed lookup backing the model's `articles_by_date` tool.
    pub async fn articles_by_date(&self, date: &str, limit: usize) -> Vec<EvidenceRecord> {
        let Some(endpoint) = &self.endpoint else {
            return vec![];
        };

        let url = format!("{}/articles", endpoint);
        let result = self
            .client
            .get(&url)
            .query(&[("date", date), ("limit", &limit.to_string())])
            .send()
            .await;

        self.collect(result, "by-date").await
    }

    async fn collect(
        &self,
        result: Result<reqwest::Response, reqwest::Error>,
        what: &str,
    ) -> Vec<EvidenceRecord> {
        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Content {} lookup returned {}", what, r.status());
                return vec![];
            }
            Err(e) => {
                warn!("Content {} lookup failed: {}", what, e);
                return vec![];
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(parsed) => parsed.articles.into_iter().map(|a| a.into_record()).collect(),
            Err(e) => {
                warn!("Content {} response unparsable: {}", what, e);
                vec![]
            }
        }
    }
}

/// Merge `extra` into `evidence`, skipping records whose URL is already
/// present.
pub fn merge_dedup(evidence: &mut Vec<EvidenceRecord>, extra: Vec<EvidenceRecord>) {
    for record in extra {
        if !evidence.iter().any(|r| r.url == record.url) {
            evidence.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(slug: &str, category: &str, sub: Option<&str>) -> StoreArticle {
        StoreArticle {
            title: format!("Articulo {}", slug),
            slug: slug.to_string(),
            category: category.to_string(),
            subcategory: sub.map(|s| s.to_string()),
            body: "cuerpo".to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_record_shape() {
        let record = article("fiesta-mayor", "noticias", None).into_record();
        assert_eq!(record.id, "article-fiesta-mayor");
        assert_eq!(record.url, "/noticias/fiesta-mayor");
        assert_eq!(record.section.as_deref(), Some("noticias"));
    }

    #[test]
    fn test_url_with_subcategory() {
        let record = article("kayak", "actividades", Some("mar")).into_record();
        assert_eq!(record.url, "/actividades/mar/kayak");
    }

    #[test]
    fn test_published_date_prefixed_into_content() {
        let mut raw = article("torneo", "noticias", None);
        raw.published_at = Some("2025-07-12".to_string());
        let record = raw.into_record();
        assert!(record.content.starts_with("(2025-07-12)"));
    }

    #[test]
    fn test_merge_dedup_by_url() {
        let mut evidence = vec![EvidenceRecord::new("a", "A", "/x", "", vec![])];
        merge_dedup(
            &mut evidence,
            vec![
                EvidenceRecord::new("b", "B", "/x", "", vec![]),
                EvidenceRecord::new("c", "C", "/y", "", vec![]),
            ],
        );
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[1].id, "c");
    }

    #[tokio::test]
    async fn test_unconfigured_store_returns_empty() {
        let client = ContentClient::new(&ContentConfig {
            endpoint: None,
            timeout_secs: 1,
        });
        assert!(client.lookup("piscina", 4).await.is_empty());
        assert!(client.articles_by_date("2025-07-12", 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_empty() {
        let client = ContentClient::new(&ContentConfig {
            endpoint: Some("http://127.0.0.1:1/api".to_string()),
            timeout_secs: 1,
        });
        assert!(client.lookup("piscina", 4).await.is_empty());
    }
}
