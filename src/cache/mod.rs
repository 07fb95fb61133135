//! Short-lived response cache for the banking stores.
//!
//! Entries expire on read; there is no eviction beyond that since the
//! key space is bounded by what the client actually fetches.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, Entry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key` if it has not expired. Expired entries are dropped.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every key built for `kind`, whatever its params
    pub fn invalidate_kind(&mut self, kind: &str) {
        let prefix = format!("{}:", kind);
        self.entries
            .retain(|key, _| key != kind && !key.starts_with(&prefix));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deterministic key from a resource kind and its query params.
///
/// Params are serialized with sorted keys and nulls dropped, so two equal
/// queries always land on the same entry.
pub fn cache_key<P: Serialize + ?Sized>(kind: &str, params: &P) -> String {
    let normalized = match serde_json::to_value(params) {
        Ok(Value::Object(map)) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
            if sorted.is_empty() {
                return kind.to_string();
            }
            serde_json::to_string(&sorted).unwrap_or_default()
        }
        Ok(Value::Null) | Err(_) => return kind.to_string(),
        Ok(other) => other.to_string(),
    };
    format!("{}:{}", kind, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("accounts", vec![1, 2, 3]);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("accounts"), Some(vec![1, 2, 3]));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("accounts"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_restarts_the_clock() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("k", "old");
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("k", "new");
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some("new"));
    }

    #[test]
    fn invalidate_kind_leaves_other_kinds() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("transactions", 1);
        cache.insert(cache_key("transactions", &json!({"page": 2})), 2);
        cache.insert("transactions_export", 3);
        cache.insert("accounts", 4);

        cache.invalidate_kind("transactions");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("transactions_export"), Some(3));
        assert_eq!(cache.get("accounts"), Some(4));
    }

    #[test]
    fn key_ignores_field_order_and_nulls() {
        let a = cache_key("transactions", &json!({"search": "uber", "page": 1, "category": null}));
        let b = cache_key("transactions", &json!({"page": 1, "search": "uber"}));
        assert_eq!(a, b);
        assert_eq!(a, r#"transactions:{"page":1,"search":"uber"}"#);
        assert_eq!(cache_key("accounts", &json!({})), "accounts");
        assert_eq!(cache_key("accounts", &()), "accounts");
    }
}
