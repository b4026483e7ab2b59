//! Latest-reading cache
//!
//! Short-lived per-dog entry exposing the most recent enriched reading to
//! polling clients. Entries expire after a fixed TTL; an expired entry reads
//! as absent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct LatestCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl LatestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn put(&self, dog_id: Uuid, value: Value) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            dog_id,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn get(&self, dog_id: Uuid) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(&dog_id) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().remove(&dog_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_then_get() {
        let cache = LatestCache::new(Duration::from_secs(300));
        let dog = Uuid::new_v4();
        cache.put(dog, json!({"heart_rate_bpm": 120}));

        let value = cache.get(dog).unwrap();
        assert_eq!(value["heart_rate_bpm"], 120);
        assert!(cache.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_newer_reading_replaces_older() {
        let cache = LatestCache::new(Duration::from_secs(300));
        let dog = Uuid::new_v4();
        cache.put(dog, json!({"seq": 1}));
        cache.put(dog, json!({"seq": 2}));
        assert_eq!(cache.get(dog).unwrap()["seq"], 2);
    }

    #[test]
    fn test_entries_expire() {
        let cache = LatestCache::new(Duration::from_millis(10));
        let dog = Uuid::new_v4();
        cache.put(dog, json!({}));
        assert!(cache.get(dog).is_some());

        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get(dog).is_none());
    }
}
