//! Request admission: origin allowlist, rate limiting, bot-challenge
//! verification.
//!
//! The limiter prefers the durable sliding-window counters and falls back
//! transparently to an in-process window when the store errors. The
//! fallback fails open only on store errors, never on genuine breaches.

use concierge_common::error::CoreError;
use lru::LruCache;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ChallengeConfig;
use crate::store::DocumentStore;

/// Upper bound on tracked keys in the in-process fallback window.
const FALLBACK_MAX_KEYS: usize = 500;

/// Which tier answered a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Durable,
    Fallback,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub limited: bool,
    pub source: RateSource,
}

/// Check the request origin against the configured allowlist.
///
/// The `Origin` header wins; absent that, the origin is parsed from
/// `Referer`. An empty allowlist disables the check.
pub fn check_origin(
    origin: Option<&str>,
    referer: Option<&str>,
    allowlist: &[String],
) -> Result<(), CoreError> {
    if allowlist.is_empty() {
        return Ok(());
    }

    let candidate = origin
        .map(|o| o.trim_end_matches('/').to_string())
        .or_else(|| referer.and_then(parse_referer_origin));

    match candidate {
        Some(candidate) if allowlist.iter().any(|a| a.trim_end_matches('/') == candidate) => Ok(()),
        Some(candidate) => Err(CoreError::OriginRejected(candidate)),
        None => Err(CoreError::OriginRejected("missing".to_string())),
    }
}

/// Extract `scheme://host[:port]` from a referer URL.
fn parse_referer_origin(referer: &str) -> Option<String> {
    let scheme_end = referer.find("://")?;
    let rest = &referer[scheme_end + 3..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    if rest[..host_end].is_empty() {
        return None;
    }
    Some(format!("{}{}", &referer[..scheme_end + 3], &rest[..host_end]))
}

/// Sliding-window rate limiter: durable store first, bounded in-process
/// window on store failure.
pub struct RateGuard {
    store: Arc<DocumentStore>,
    fallback: Mutex<LruCache<String, Vec<Instant>>>,
}

impl RateGuard {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            fallback: Mutex::new(LruCache::new(
                NonZeroUsize::new(FALLBACK_MAX_KEYS).unwrap(),
            )),
        }
    }

    pub fn is_rate_limited(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        namespace: &str,
    ) -> RateDecision {
        match self.store.rate_limit_hit(namespace, key, max, window) {
            Ok(limited) => RateDecision {
                limited,
                source: RateSource::Durable,
            },
            Err(e) => {
                warn!("Durable rate limit unavailable ({}), using fallback", e);
                RateDecision {
                    limited: self.fallback_hit(&format!("{}:{}", namespace, key), max, window),
                    source: RateSource::Fallback,
                }
            }
        }
    }

    fn fallback_hit(&self, key: &str, max: u32, window: Duration) -> bool {
        let now = Instant::now();
        let mut fallback = self.fallback.lock().unwrap();

        if !fallback.contains(key) {
            fallback.put(key.to_string(), Vec::new());
        }
        let hits = fallback.get_mut(key).unwrap();

        hits.retain(|t| now.duration_since(*t) < window);
        if hits.len() >= max as usize {
            return true;
        }
        hits.push(now);
        false
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeVerdict {
    #[serde(default)]
    success: bool,
}

/// Verify a bot-challenge token against the provider.
///
/// No configured secret means verification is disabled and every request
/// passes. With a secret configured, a missing token always fails; an
/// unreachable provider fails closed.
pub async fn verify_challenge(
    client: &reqwest::Client,
    config: &ChallengeConfig,
    token: Option<&str>,
    client_ip: Option<&str>,
) -> Result<(), CoreError> {
    let Some(secret) = &config.secret else {
        debug!("Challenge verification disabled (no secret configured)");
        return Ok(());
    };

    let Some(token) = token else {
        return Err(CoreError::ChallengeFailed);
    };

    let mut form = vec![
        ("secret", secret.as_str()),
        ("response", token),
    ];
    if let Some(ip) = client_ip {
        form.push(("remoteip", ip));
    }

    let response = client
        .post(&config.endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            warn!("Challenge provider unreachable: {}", e);
            CoreError::ChallengeFailed
        })?;

    let verdict: ChallengeVerdict = response.json().await.map_err(|e| {
        warn!("Challenge provider reply unparsable: {}", e);
        CoreError::ChallengeFailed
    })?;

    if verdict.success {
        Ok(())
    } else {
        Err(CoreError::ChallengeFailed)
    }
}
