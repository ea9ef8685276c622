//! Result cache with TTL expiry and LRU eviction
//!
//! # Thread Safety
//!
//! One `tokio::sync::Mutex` serializes every read and write. A read that
//! finds an expired entry removes it, so expiry is lazy and no sweeper task
//! is needed.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::lookup::LookupResult;
use crate::search_term::SearchTerm;

/// Cached result with its insertion time
#[derive(Debug, Clone)]
struct CacheEntry {
    result: LookupResult,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

pub struct ResultCache {
    entries: Mutex<LruCache<SearchTerm, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            max_entries: capacity.get(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Fresh result for `term`, refreshing its LRU position
    pub async fn get(&self, term: &SearchTerm) -> Option<LookupResult> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(term) {
            Some(entry) if !entry.is_expired(self.ttl) => return Some(entry.result.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(term);
            tracing::debug!(%term, "Cache entry expired");
        }
        None
    }

    /// Insert or replace; evicts the least recently used entry when full
    pub async fn put(&self, term: SearchTerm, result: LookupResult) {
        let entry = CacheEntry {
            result,
            inserted_at: Instant::now(),
        };
        let displaced = self.entries.lock().await.push(term.clone(), entry);
        if let Some((evicted, _)) = displaced {
            // push also returns the old value when the key was already present
            if evicted != term {
                tracing::debug!(%evicted, "Cache full, evicted least recently used entry");
            }
        }
    }

    /// Drop every entry, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        count
    }

    /// Entry count, including expired entries not yet read
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
