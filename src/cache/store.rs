//! Rendered sitemap storage.
//!
//! Entries expire after a fixed TTL and are evicted LRU-first once the entry
//! limit is reached. Concurrent misses on one key may both build; the last
//! write wins.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::domain::languages::LanguageMarker;
use crate::domain::types::SitemapKind;

use super::config::CacheConfig;
use super::keys::SitemapCacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Clone)]
struct CacheEntry {
    body: Arc<str>,
    expires_at: Instant,
}

pub struct SitemapCache {
    entries: RwLock<LruCache<SitemapCacheKey, CacheEntry>>,
    ttl: Duration,
}

impl SitemapCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached body if present and unexpired. Expired entries are
    /// dropped on read.
    pub fn get(&self, key: &SitemapCacheKey) -> Option<Arc<str>> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.body.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: SitemapCacheKey, body: Arc<str>) {
        let entry = CacheEntry {
            body,
            expires_at: Instant::now() + self.ttl,
        };
        let evicted = rw_write(&self.entries, SOURCE, "put").push(key.clone(), entry);
        if let Some((evicted_key, _)) = evicted.filter(|(evicted_key, _)| *evicted_key != key) {
            metrics::counter!("waymark_sitemap_cache_evict_total").increment(1);
            debug!(target = SOURCE, key = %evicted_key, "evicted sitemap entry");
        }
    }

    /// Serves `key` from cache or builds, stores and returns it. Build
    /// failures are returned as-is and nothing is stored.
    pub async fn get_or_build<F, Fut, E>(
        &self,
        key: &SitemapCacheKey,
        build: F,
    ) -> Result<Arc<str>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(body) = self.get(key) {
            metrics::counter!("waymark_sitemap_cache_hit_total").increment(1);
            debug!(target = SOURCE, key = %key, "sitemap cache hit");
            return Ok(body);
        }

        metrics::counter!("waymark_sitemap_cache_miss_total").increment(1);
        debug!(target = SOURCE, key = %key, "sitemap cache miss");
        let body: Arc<str> = build().await?.into();
        self.put(key.clone(), body.clone());
        Ok(body)
    }

    pub fn invalidate(&self, key: &SitemapCacheKey) -> bool {
        rw_write(&self.entries, SOURCE, "invalidate")
            .pop(key)
            .is_some()
    }

    /// Removes every listed key, returning how many were present.
    pub fn invalidate_keys<'a>(&self, keys: impl IntoIterator<Item = &'a SitemapCacheKey>) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_keys");
        keys.into_iter()
            .filter(|key| entries.pop(*key).is_some())
            .count()
    }

    /// Clears `page:{kind}`, `page:{kind}:{iso2}` for each language, and
    /// `index`.
    pub fn invalidate_for_kind(&self, kind: &SitemapKind, languages: &[LanguageMarker]) -> usize {
        let keys = kind_keys(kind, languages);
        self.invalidate_keys(&keys)
    }

    pub fn invalidate_all(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_all");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keys touched when one kind changes.
pub fn kind_keys(kind: &SitemapKind, languages: &[LanguageMarker]) -> Vec<SitemapCacheKey> {
    let mut keys = Vec::with_capacity(languages.len() + 2);
    keys.push(SitemapCacheKey::page(kind, None));
    keys.extend(
        languages
            .iter()
            .map(|language| SitemapCacheKey::page(kind, Some(&language.iso2))),
    );
    keys.push(SitemapCacheKey::Index);
    keys
}
