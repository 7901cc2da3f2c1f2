//! In-process TTL cache with tag invalidation.

use crate::{clock::Clock, ports::Cache, types::Timestamp};
use chrono::Duration;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

struct CacheEntry {
    value:      String,
    expires_at: Timestamp,
    tags:       Vec<String>,
}

pub struct InMemoryCache {
    clock:   Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic mid-update leaves at worst a stale entry; keep serving.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Live (unexpired) entry count.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries().values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl_seconds: u64, tags: &[String]) {
        if ttl_seconds == 0 {
            return;
        }
        let ttl = Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(i64::MAX / 1_000));
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now() + ttl,
            tags: tags.to_vec(),
        };
        self.entries().insert(key.to_string(), entry);
    }

    fn invalidate_by_tag(&self, tag: &str) {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        let dropped = before - entries.len();
        if dropped > 0 {
            log::debug!("cache: invalidated {dropped} entries tagged {tag}");
        }
    }
}
