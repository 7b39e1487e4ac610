//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_ENTRIES: usize = 256;

/// Sitemap cache limits derived from the `[sitemap]` configuration section.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of a rendered document.
    pub ttl: Duration,
    /// Maximum number of documents held before LRU eviction.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::SitemapCacheSettings> for CacheConfig {
    fn from(settings: &crate::config::SitemapCacheSettings) -> Self {
        Self {
            ttl: settings.cache_ttl,
            max_entries: settings.cache_max_entries.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
