//! Cache abstraction: a uniform get/set/delete/clear contract.
//!
//! Production wires a durable-store-backed tier behind the same trait the
//! in-memory tier implements, so call sites and tests never touch a
//! module-level singleton.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Uniform cache contract.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>);
    fn delete(&self, key: &str) -> bool;
    fn clear(&self);
}

impl<T: Cache + ?Sized> Cache for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> bool {
        (**self).delete(key)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-process cache with optional per-entry TTL.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) => {
                if let Some(expires_at) = entry.expires_at {
                    if Instant::now() >= expires_at {
                        entries.remove(key);
                        return None;
                    }
                }
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.lock().unwrap().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Ordered chain of cache tiers with a uniform get/put contract.
///
/// `get` consults tiers in order and backfills every earlier tier on a hit;
/// `set` writes through to all tiers. Tiers can be added or removed without
/// touching call sites.
pub struct TieredCache {
    tiers: Vec<Box<dyn Cache>>,
}

impl TieredCache {
    pub fn new(tiers: Vec<Box<dyn Cache>>) -> Self {
        Self { tiers }
    }
}

impl Cache for TieredCache {
    fn get(&self, key: &str) -> Option<String> {
        for (i, tier) in self.tiers.iter().enumerate() {
            if let Some(value) = tier.get(key) {
                for earlier in &self.tiers[..i] {
                    earlier.set(key, &value, None);
                }
                return Some(value);
            }
        }
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        for tier in &self.tiers {
            tier.set(key, value, ttl);
        }
    }

    fn delete(&self, key: &str) -> bool {
        let mut deleted = false;
        for tier in &self.tiers {
            deleted |= tier.delete(key);
        }
        deleted
    }

    fn clear(&self) {
        for tier in &self.tiers {
            tier.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        cache.set("k", "v", None);
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert!(cache.delete("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_memory_cache_ttl_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Some(Duration::ZERO));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new();
        cache.set("a", "1", None);
        cache.set("b", "2", None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tiered_consults_in_order_and_backfills() {
        let fast = std::sync::Arc::new(MemoryCache::new());
        let slow = std::sync::Arc::new(MemoryCache::new());
        slow.set("k", "from-slow", None);

        let tiered = TieredCache::new(vec![Box::new(fast.clone()), Box::new(slow.clone())]);
        assert!(fast.get("k").is_none());
        assert_eq!(tiered.get("k").as_deref(), Some("from-slow"));

        // The hit was backfilled into the earlier tier.
        assert_eq!(fast.get("k").as_deref(), Some("from-slow"));
    }

    #[test]
    fn test_tiered_set_writes_through() {
        let tiered = TieredCache::new(vec![
            Box::new(MemoryCache::new()),
            Box::new(MemoryCache::new()),
        ]);
        tiered.set("k", "v", None);
        assert_eq!(tiered.get("k").as_deref(), Some("v"));
        assert!(tiered.delete("k"));
        assert!(tiered.get("k").is_none());
    }
}
