//! Sitemap cache.
//!
//! Rendered sitemap documents are cached in process, keyed by document, and
//! cleared eagerly by [`CacheTrigger`] whenever content or settings change.
//!
//! ```toml
//! [sitemap]
//! cache_ttl_seconds = 3600
//! cache_max_entries = 256
//! ```

mod config;
mod keys;
mod lock;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use keys::SitemapCacheKey;
pub(crate) use lock::{rw_read, rw_write};
pub use store::{SitemapCache, kind_keys};
pub use trigger::{CacheEvent, CacheTrigger, InvalidationHook, InvalidationScope, plan};
